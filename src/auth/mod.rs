//! Admin session tokens
//!
//! The admin panel logs in with a configured password and receives a
//! short-lived HS256 token, presented on later requests in the
//! `X-Admin-Auth` header.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{ApiError, Result};

/// Subject claim carried by admin tokens
const ADMIN_SUBJECT: &str = "admin";

/// Claims for an admin panel session
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// Issue an admin token valid for `ttl_seconds`
pub fn issue_admin_token(secret: &str, ttl_seconds: u64) -> Result<String> {
    let now = epoch_now();
    let claims = AdminClaims {
        sub: ADMIN_SUBJECT.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))
}

/// Validate an admin token (signature, expiry, subject)
pub fn validate_admin_token(secret: &str, token: &str) -> Result<()> {
    let data = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    if data.claims.sub != ADMIN_SUBJECT {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = issue_admin_token("secret", 3600).unwrap();
        assert!(validate_admin_token("secret", &token).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_admin_token("secret", 3600).unwrap();
        assert!(validate_admin_token("other-secret", &token).is_err());
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(validate_admin_token("secret", "not-a-token").is_err());
    }

    #[test]
    fn test_foreign_subject_is_rejected() {
        let now = epoch_now();
        let claims = AdminClaims {
            sub: "student".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("secret".as_bytes()),
        )
        .unwrap();

        assert!(validate_admin_token("secret", &token).is_err());
    }
}
