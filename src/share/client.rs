use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::db::models::ShareStatus;
use crate::error::{AppError, ShareError};

#[derive(Debug, Clone, Serialize)]
pub struct ActivateRequest {
    pub token_ref: Uuid,
    pub tenant_url: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Partner-side view of an activated card.
#[derive(Debug, Clone, Deserialize)]
pub struct CardActivation {
    pub card_id: String,
    pub activation_code: String,
    pub status: ShareStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outbound gateway to the card-activation partner. Trait-seamed so handlers
/// can be exercised against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardActivator: Send + Sync {
    async fn activate(&self, req: ActivateRequest) -> Result<CardActivation, AppError>;

    async fn query(&self, card_id: &str) -> Result<CardActivation, AppError>;
}

pub struct CardServiceClient {
    http: reqwest::Client,
    share_base: String,
    app_id: String,
    app_secret: String,
}

impl CardServiceClient {
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(upstream.request_timeout_secs))
            .build()
            .map_err(|e| AppError::InternalError(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            share_base: upstream.share_base.trim_end_matches('/').to_string(),
            app_id: upstream.share_app_id.clone(),
            app_secret: upstream.share_app_secret.clone(),
        })
    }

    async fn parse_activation(response: reqwest::Response) -> Result<CardActivation, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);

            return Err(ShareError::PartnerRejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response
            .json::<CardActivation>()
            .await
            .map_err(|e| ShareError::PartnerUnreachable(e.to_string()).into())
    }
}

#[async_trait]
impl CardActivator for CardServiceClient {
    async fn activate(&self, req: ActivateRequest) -> Result<CardActivation, AppError> {
        let body = serde_json::json!({
            "app_id": self.app_id,
            "token_ref": req.token_ref,
            "tenant_url": req.tenant_url,
            "access_token": req.access_token,
            "email": req.email,
        });

        let response = self
            .http
            .post(format!("{}/api/v1/cards/activate", self.share_base))
            .header("X-App-Secret", self.app_secret.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| ShareError::PartnerUnreachable(e.to_string()))?;

        Self::parse_activation(response).await
    }

    async fn query(&self, card_id: &str) -> Result<CardActivation, AppError> {
        let response = self
            .http
            .get(format!("{}/api/v1/cards/{}", self.share_base, card_id))
            .header("X-App-Secret", self.app_secret.as_str())
            .send()
            .await
            .map_err(|e| ShareError::PartnerUnreachable(e.to_string()))?;

        Self::parse_activation(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_gateway_dispatch_through_trait_object() {
        let mut mock = MockCardActivator::new();
        mock.expect_activate().returning(|req| {
            Ok(CardActivation {
                card_id: format!("card-{}", req.token_ref),
                activation_code: "AC-1".to_string(),
                status: ShareStatus::Active,
                expires_at: None,
            })
        });
        mock.expect_query().returning(|card_id| {
            Ok(CardActivation {
                card_id: card_id.to_string(),
                activation_code: "AC-1".to_string(),
                status: ShareStatus::Revoked,
                expires_at: None,
            })
        });

        let gateway: Arc<dyn CardActivator> = Arc::new(mock);

        let token_ref = Uuid::new_v4();
        let activation = gateway
            .activate(ActivateRequest {
                token_ref,
                tenant_url: "https://t1.api.augmentcode.com/".to_string(),
                access_token: "aug_plaintext".to_string(),
                email: None,
            })
            .await
            .unwrap();
        assert_eq!(activation.card_id, format!("card-{}", token_ref));

        let queried = gateway.query(&activation.card_id).await.unwrap();
        assert_eq!(queried.status, ShareStatus::Revoked);
    }
}
