//! At-rest protection for stored access tokens.
//!
//! Tokens are sealed with AES-256-GCM before they hit the database and only
//! opened on paths that need the plaintext (validation probes, card sharing,
//! the explicit admin reveal).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use crate::error::AppError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const SEAL_VERSION: &str = "v1";

pub struct TokenCipher {
    encryption_key: [u8; KEY_SIZE],
}

impl TokenCipher {
    pub fn new(encryption_key: [u8; KEY_SIZE]) -> Self {
        Self { encryption_key }
    }

    pub fn from_base64_key(key: &str) -> Result<Self, AppError> {
        let key_bytes = BASE64
            .decode(key)
            .map_err(|e| AppError::ConfigError(format!("Invalid encryption key: {}", e)))?;

        if key_bytes.len() != KEY_SIZE {
            return Err(AppError::ConfigError("Invalid encryption key length".to_string()));
        }

        let mut encryption_key = [0u8; KEY_SIZE];
        encryption_key.copy_from_slice(&key_bytes);

        Ok(Self { encryption_key })
    }

    /// Seals a plaintext token into the stored `v1:<nonce>:<ciphertext>` form.
    pub fn seal(&self, token: &str) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| AppError::InternalError(format!("Encryption error: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted = cipher
            .encrypt(nonce, token.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Encryption failed: {}", e)))?;

        Ok(format!(
            "{}:{}:{}",
            SEAL_VERSION,
            BASE64.encode(nonce_bytes),
            BASE64.encode(encrypted)
        ))
    }

    pub fn open(&self, sealed: &str) -> Result<String, AppError> {
        let mut parts = sealed.splitn(3, ':');
        let (version, nonce_b64, data_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(n), Some(d)) => (v, n, d),
            _ => return Err(AppError::InternalError("Malformed sealed token".to_string())),
        };

        if version != SEAL_VERSION {
            return Err(AppError::InternalError(format!(
                "Unsupported seal version: {}",
                version
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| AppError::InternalError(format!("Decryption error: {}", e)))?;

        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| AppError::InternalError(format!("Invalid nonce: {}", e)))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(AppError::InternalError("Invalid nonce length".to_string()));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted_data = BASE64
            .decode(data_b64)
            .map_err(|e| AppError::InternalError(format!("Invalid encrypted data: {}", e)))?;

        let decrypted = cipher
            .decrypt(nonce, encrypted_data.as_ref())
            .map_err(|e| AppError::InternalError(format!("Decryption failed: {}", e)))?;

        String::from_utf8(decrypted)
            .map_err(|e| AppError::InternalError(format!("Invalid UTF-8: {}", e)))
    }
}

/// Deterministic fingerprint of a plaintext token, used for duplicate
/// detection since sealed forms never repeat.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short preview for list views; the full plaintext never appears there.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if token.chars().count() > 8 {
        format!("{}…", prefix)
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_test_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    #[test]
    fn test_seal_open_round_trip() {
        let cipher = TokenCipher::new(generate_test_key());

        let token = "aug_0123456789abcdef";
        let sealed = cipher.seal(token).unwrap();

        assert!(sealed.starts_with("v1:"));
        assert_ne!(sealed, token);

        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened, token);
    }

    #[test]
    fn test_seal_is_nondeterministic() {
        let cipher = TokenCipher::new(generate_test_key());

        let a = cipher.seal("same-token").unwrap();
        let b = cipher.seal("same-token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let cipher = TokenCipher::new(generate_test_key());
        let sealed = cipher.seal("secret").unwrap();

        let other = TokenCipher::new(generate_test_key());
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_open_rejects_malformed_input() {
        let cipher = TokenCipher::new(generate_test_key());

        assert!(cipher.open("not-sealed").is_err());
        assert!(cipher.open("v2:AAAA:BBBB").is_err());
        assert!(cipher.open("v1:!!!:BBBB").is_err());
    }

    #[test]
    fn test_from_base64_key_validates_length() {
        let short = BASE64.encode([0u8; 16]);
        assert!(TokenCipher::from_base64_key(&short).is_err());

        let ok = BASE64.encode([7u8; 32]);
        assert!(TokenCipher::from_base64_key(&ok).is_ok());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
        assert_eq!(token_digest("abc").len(), 64);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("aug_0123456789"), "aug_0123…");
        assert_eq!(redact("short"), "short");
    }
}
