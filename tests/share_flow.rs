use augment_admin_server::config::UpstreamConfig;
use augment_admin_server::db::ShareStatus;
use augment_admin_server::error::{AppError, ShareError};
use augment_admin_server::share::{ActivateRequest, CardActivator, CardServiceClient};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream_for(server: &MockServer) -> UpstreamConfig {
    UpstreamConfig {
        auth_base: server.uri(),
        portal_base: server.uri(),
        client_id: "test-client".to_string(),
        share_base: server.uri(),
        share_app_id: "test-app".to_string(),
        share_app_secret: "test-secret".to_string(),
        request_timeout_secs: 5,
    }
}

fn activate_request(token_ref: Uuid) -> ActivateRequest {
    ActivateRequest {
        token_ref,
        tenant_url: "https://t1.api.augmentcode.com/".to_string(),
        access_token: "aug_plaintext".to_string(),
        email: Some("user@example.com".to_string()),
    }
}

#[tokio::test]
async fn test_activate_card() {
    let server = MockServer::start().await;
    let token_ref = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/v1/cards/activate"))
        .and(header("X-App-Secret", "test-secret"))
        .and(body_partial_json(serde_json::json!({
            "app_id": "test-app",
            "access_token": "aug_plaintext",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "card_id": "card-777",
            "activation_code": "AC-999",
            "status": "active",
            "expires_at": null
        })))
        .mount(&server)
        .await;

    let client = CardServiceClient::new(&upstream_for(&server)).unwrap();
    let activation = client.activate(activate_request(token_ref)).await.unwrap();

    assert_eq!(activation.card_id, "card-777");
    assert_eq!(activation.activation_code, "AC-999");
    assert_eq!(activation.status, ShareStatus::Active);
    assert!(activation.expires_at.is_none());
}

#[tokio::test]
async fn test_query_card_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cards/card-777"))
        .and(header("X-App-Secret", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "card_id": "card-777",
            "activation_code": "AC-999",
            "status": "expired",
            "expires_at": "2026-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = CardServiceClient::new(&upstream_for(&server)).unwrap();
    let activation = client.query("card-777").await.unwrap();

    assert_eq!(activation.status, ShareStatus::Expired);
    assert!(activation.expires_at.is_some());
}

#[test]
fn test_partner_rejection_surfaces_message() {
    tokio_test::block_on(async {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/cards/activate"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "app secret mismatch"}
            })))
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&upstream_for(&server)).unwrap();
        let err = client.activate(activate_request(Uuid::new_v4())).await.unwrap_err();

        match err {
            AppError::ShareError(ShareError::PartnerRejected { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "app secret mismatch");
            }
            other => panic!("unexpected error: {}", other),
        }
    });
}

#[tokio::test]
async fn test_partner_unreachable() {
    // Nothing listens on port 1.
    let upstream = UpstreamConfig {
        auth_base: "http://127.0.0.1:1".to_string(),
        portal_base: "http://127.0.0.1:1".to_string(),
        client_id: "test-client".to_string(),
        share_base: "http://127.0.0.1:1".to_string(),
        share_app_id: "test-app".to_string(),
        share_app_secret: "test-secret".to_string(),
        request_timeout_secs: 2,
    };

    let client = CardServiceClient::new(&upstream).unwrap();
    let err = client.query("card-1").await.unwrap_err();

    assert!(matches!(
        err,
        AppError::ShareError(ShareError::PartnerUnreachable(_))
    ));
}
