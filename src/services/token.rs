//! Bearer token minting and decoding (HS256).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signing secret is not configured")]
    MissingSecret,

    #[error("Failed to encode token: {0}")]
    Encode(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Option<Vec<u8>>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: Option<&str>, ttl_hours: u64) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
            ttl: i64::try_from(ttl_hours)
                .ok()
                .and_then(Duration::try_hours)
                .unwrap_or(Duration::MAX),
        }
    }

    fn secret(&self) -> Result<&[u8], TokenError> {
        self.secret.as_deref().ok_or(TokenError::MissingSecret)
    }

    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let secret = self.secret()?;
        let iat = now.timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl.num_seconds()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Checks signature and expiry; says nothing about the referenced user.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let secret = self.secret()?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
