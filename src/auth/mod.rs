//! Authentication module for the Augment admin server
//!
//! This module handles the single-operator session login,
//! token minting, and session validation.

mod service;
pub mod handlers;

pub use service::{AuthService, Claims};
pub use handlers::require_session;
