//! Database module for the Augment admin server
//!
//! This module handles database connections, migrations,
//! and data access layer operations.

pub mod models;
pub mod operations;

pub use models::{AdminSession, ShareStatus, Token, TokenShare, TokenStatus};
pub use operations::{clamp_page_params, DbOperations, DbPoolStatus};
