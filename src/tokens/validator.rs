use tracing::debug;

use crate::error::AppError;

/// Result of probing a tenant with a stored token. `Inconclusive` covers
/// transport failures and unexpected statuses; those never flip a token's
/// stored state.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Active,
    Banned,
    Inconclusive(String),
}

/// Probes tenant endpoints to check whether stored tokens still work.
pub struct TokenValidator {
    http: reqwest::Client,
}

impl TokenValidator {
    pub fn new(timeout_secs: u64) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::InternalError(format!("HTTP client init failed: {}", e)))?;

        Ok(Self { http })
    }

    /// One probe, no retries. Tenant URLs are stored with a trailing slash.
    pub async fn probe(&self, tenant_url: &str, access_token: &str) -> ProbeOutcome {
        let url = format!("{}v1/models", tenant_url);

        match self.http.get(&url).bearer_auth(access_token).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    ProbeOutcome::Active
                } else if status.as_u16() == 401 || status.as_u16() == 403 {
                    ProbeOutcome::Banned
                } else {
                    debug!("Probe of {} returned {}", url, status);
                    ProbeOutcome::Inconclusive(format!("status {}", status))
                }
            }
            Err(e) => ProbeOutcome::Inconclusive(e.to_string()),
        }
    }
}
