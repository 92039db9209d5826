//! Token sharing through the third-party card-activation service.

pub mod client;

pub use client::{ActivateRequest, CardActivation, CardActivator, CardServiceClient};
