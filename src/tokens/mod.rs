//! Token record management: CRUD, pagination, bulk import, batch validation,
//! session import, and card sharing.

pub mod handlers;
pub mod validator;

use url::Url;

use crate::error::AppError;

pub use validator::{ProbeOutcome, TokenValidator};

/// Validates and normalizes a tenant base URL. Stored tenant URLs always end
/// with `/` so probe paths can be appended directly.
pub fn normalize_tenant_url(input: &str) -> Result<String, AppError> {
    let trimmed = input.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| AppError::ValidationError(format!("Invalid tenant URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::ValidationError(format!(
                "Unsupported tenant URL scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::ValidationError("Tenant URL has no host".to_string()));
    }

    let mut normalized = trimmed.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tenant_url_appends_slash() {
        assert_eq!(
            normalize_tenant_url("https://t1.api.augmentcode.com").unwrap(),
            "https://t1.api.augmentcode.com/"
        );
        assert_eq!(
            normalize_tenant_url("https://t1.api.augmentcode.com/").unwrap(),
            "https://t1.api.augmentcode.com/"
        );
    }

    #[test]
    fn test_normalize_tenant_url_rejects_garbage() {
        assert!(normalize_tenant_url("not a url").is_err());
        assert!(normalize_tenant_url("ftp://t1.example.com").is_err());
        assert!(normalize_tenant_url("").is_err());
    }
}
