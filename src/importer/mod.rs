//! Session-import flow: mints a durable access-token record from an opaque
//! browser session cookie.
//!
//! The flow is a single pass over the vendor's web surface: fetch the account
//! page, pull the embedded OAuth parameters out of the HTML, exchange the
//! authorization code for an access token, then opportunistically fetch
//! account metadata. There is no retry, backoff, or persisted intermediate
//! state; a failure at any required step surfaces as one `ImportError`
//! variant and the caller starts over with a fresh cookie.

pub mod extract;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::error::{AppError, ImportError};
use extract::{cookie_candidates, extract_oauth_params, looks_like_login_page};

/// Everything the flow managed to learn about the account. `customer` is
/// best-effort and absent whenever the portal refused every cookie shape.
#[derive(Debug, Clone)]
pub struct ImportedCredentials {
    pub access_token: String,
    pub tenant_url: String,
    pub customer: Option<CustomerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    pub email: Option<String>,
    pub plan: Option<String>,
    pub credits_balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    tenant_url: Option<String>,
}

pub struct SessionImporter {
    http: reqwest::Client,
    auth_base: String,
    portal_base: String,
    client_id: String,
}

impl SessionImporter {
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(upstream.request_timeout_secs))
            .build()
            .map_err(|e| AppError::InternalError(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            auth_base: upstream.auth_base.trim_end_matches('/').to_string(),
            portal_base: upstream.portal_base.trim_end_matches('/').to_string(),
            client_id: upstream.client_id.clone(),
        })
    }

    /// Runs the whole flow against the given browser session cookie.
    pub async fn import(&self, cookie: &str) -> Result<ImportedCredentials, AppError> {
        let page = self.fetch_account_page(cookie).await?;

        let params = extract_oauth_params(&page)?;
        debug!("Extracted OAuth code ({} chars)", params.code.len());

        let token_response = self.exchange_code(&params.code).await?;

        let access_token = token_response
            .access_token
            .ok_or_else(|| ImportError::ExchangeFailed("no access_token in response".to_string()))?;

        // The token endpoint's tenant assignment wins over the scraped page.
        let tenant_url = token_response
            .tenant_url
            .or(params.tenant_url)
            .ok_or(ImportError::ParamsMissing("tenant_url"))?;

        let customer = self.fetch_customer_info(cookie).await;
        if customer.is_none() {
            warn!("Account metadata unavailable; importing token without it");
        }

        info!("Session import minted token for tenant {}", tenant_url);

        Ok(ImportedCredentials {
            access_token,
            tenant_url,
            customer,
        })
    }

    async fn fetch_account_page(&self, cookie: &str) -> Result<String, AppError> {
        let cookie_header = pair_form(cookie);

        let response = self
            .http
            .get(format!("{}/account", self.auth_base))
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await
            .map_err(|e| ImportError::PageFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Upstream answers auth failures with a redirect-to-login or 401.
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(ImportError::SessionRejected.into());
            }
            return Err(ImportError::PageFetch(format!("status {}", status)).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ImportError::PageFetch(e.to_string()))?;

        if looks_like_login_page(&body) {
            return Err(ImportError::SessionRejected.into());
        }

        Ok(body)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth/token", self.auth_base))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ImportError::ExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::ExchangeFailed(format!("status {}: {}", status, body)).into());
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ImportError::ExchangeFailed(e.to_string()))?;

        Ok(token_response)
    }

    /// Best-effort metadata fetch. Tries each cookie-header shape until the
    /// portal accepts one; all failures collapse to `None`.
    async fn fetch_customer_info(&self, cookie: &str) -> Option<CustomerInfo> {
        for candidate in cookie_candidates(cookie) {
            let response = self
                .http
                .get(format!("{}/api/v1/customer", self.portal_base))
                .header(reqwest::header::COOKIE, candidate.as_str())
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<CustomerInfo>().await {
                        Ok(info) => return Some(info),
                        Err(e) => {
                            debug!("Customer payload did not parse: {}", e);
                            return None;
                        }
                    }
                }
                Ok(resp) => {
                    debug!("Customer fetch refused cookie shape: status {}", resp.status());
                }
                Err(e) => {
                    debug!("Customer fetch transport error: {}", e);
                }
            }
        }

        None
    }
}

/// Cookie headers must be `name=value`; bare session values get the default
/// cookie name attached.
fn pair_form(cookie: &str) -> String {
    let cookie = cookie.trim();
    if cookie.contains('=') {
        cookie.to_string()
    } else {
        format!("_session={}", cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_form() {
        assert_eq!(pair_form("abc"), "_session=abc");
        assert_eq!(pair_form("_session=abc"), "_session=abc");
        assert_eq!(pair_form("  sid=1  "), "sid=1");
    }
}
