use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Import error: {0}")]
    ImportError(#[from] ImportError),

    #[error("Share error: {0}")]
    ShareError(#[from] ShareError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::DatabaseError(DatabaseError::NotFound),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DatabaseError(DatabaseError::Duplicate)
            }
            _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
        }
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::AuthError(AuthError::TokenExpired)
            }
            _ => AppError::AuthError(AuthError::InvalidToken),
        }
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Unauthorized => StatusCode::FORBIDDEN,
            },
            AppError::ImportError(e) => match e {
                ImportError::SessionRejected => StatusCode::UNPROCESSABLE_ENTITY,
                ImportError::ParamsMissing(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ImportError::PageFetch(_) => StatusCode::BAD_GATEWAY,
                ImportError::ExchangeFailed(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::ShareError(e) => match e {
                ShareError::NotShared => StatusCode::NOT_FOUND,
                ShareError::PartnerUnreachable(_) => StatusCode::BAD_GATEWAY,
                ShareError::PartnerRejected { .. } => StatusCode::BAD_GATEWAY,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,
}

/// Failure taxonomy for the session-import flow. Each step of the flow maps to
/// exactly one variant so callers can tell a dead cookie from a vendor page
/// change from a refused code exchange.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to fetch account page: {0}")]
    PageFetch(String),

    #[error("Session cookie rejected by upstream")]
    SessionRejected,

    #[error("OAuth parameter not found in page: {0}")]
    ParamsMissing(&'static str),

    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Card service unreachable: {0}")]
    PartnerUnreachable(String),

    #[error("Card service rejected request ({status}): {message}")]
    PartnerRejected { status: u16, message: String },

    #[error("Token has not been shared")]
    NotShared,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        // Test IO error conversion
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        // Test config error conversion
        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        // Test database error conversion
        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::NotFound)));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::Unauthorized);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::ValidationError("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::DatabaseError(DatabaseError::Duplicate);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_import_error_status_codes() {
        let err = AppError::ImportError(ImportError::SessionRejected);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::ImportError(ImportError::ParamsMissing("code"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::ImportError(ImportError::PageFetch("timeout".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = AppError::ImportError(ImportError::ExchangeFailed("400".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_share_error_status_codes() {
        let err = AppError::ShareError(ShareError::NotShared);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::ShareError(ShareError::PartnerUnreachable("dns".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = AppError::ShareError(ShareError::PartnerRejected {
            status: 403,
            message: "bad app secret".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");

        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");

        let err = AppError::ImportError(ImportError::SessionRejected);
        assert_eq!(err.to_string(), "Import error: Session cookie rejected by upstream");
    }
}
