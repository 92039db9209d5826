use crate::db::operations::DbOperations;
use crate::db::models::AdminSession;
use crate::error::{AppError, AuthError};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Always "admin"; there is a single operator account
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

pub struct AuthService {
    db: DbOperations,
    admin_password_digest: [u8; 32],
    jwt_secret: String,
    token_expiry_hours: i64,
}

impl AuthService {
    pub fn new(db: DbOperations, admin_password: &str, jwt_secret: String, token_expiry_hours: i64) -> Self {
        Self {
            db,
            admin_password_digest: digest(admin_password),
            jwt_secret,
            token_expiry_hours,
        }
    }

    /// Single-credential admin login. On success a session JWT is minted and
    /// persisted so logout can revoke it server-side.
    pub async fn login(&self, password: &str) -> Result<String, AppError> {
        // Digest comparison keeps the check length-independent.
        if digest(password) != self.admin_password_digest {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.generate_token()?;

        let session = AdminSession::new(token.clone(), self.token_expiry_hours);
        self.db.create_session(&session).await?;

        Ok(token)
    }

    pub async fn validate_token(&self, token: &str) -> Result<AdminSession, AppError> {
        // First check if session exists and is not expired
        let session = self.db.get_session_by_token(token).await?
            .ok_or(AuthError::InvalidToken)?;

        if session.is_expired() {
            return Err(AuthError::TokenExpired.into());
        }

        // Validate JWT
        self.decode_token(token)?;

        // Update session activity
        self.db.update_session_activity(token).await?;

        Ok(session)
    }

    /// Idempotent; logging out an unknown token is not an error.
    pub async fn invalidate_token(&self, token: &str) -> Result<(), AppError> {
        self.db.delete_session(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        self.db.cleanup_expired_sessions().await
    }

    fn generate_token(&self) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.token_expiry_hours)).timestamp();
        let claims = Claims {
            sub: "admin".to_string(),
            exp,
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}

fn digest(input: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}
