use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::error::{AppError, AuthError};
use tracing::{info, error};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Extracts the Bearer token from the Authorization header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::InvalidToken.into())
}

/// Session guard used by every admin route except login and health.
pub async fn require_session(req: &HttpRequest, state: &AppState) -> Result<(), AppError> {
    let token = bearer_token(req)?;
    state.auth_service.validate_token(token).await?;
    Ok(())
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth_service.login(&req.password).await {
        Ok(token) => {
            info!("Admin login successful");
            Ok(HttpResponse::Ok().json(AuthResponse { token }))
        }
        Err(e) => {
            error!("Admin login failed: {}", e);
            Err(e)
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;

    state.auth_service.invalidate_token(token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

/// Confirms the presented session is still valid. The admin UI polls this on
/// load to decide whether to show the login screen.
pub async fn validate(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let session = state.auth_service.validate_token(token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "valid": true,
        "expires_at": session.expires_at.to_rfc3339(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_extraction() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(bearer_token(&req).is_err());

        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_err());
    }
}
