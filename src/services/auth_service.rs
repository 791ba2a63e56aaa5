//! Domain service for registration, login and bearer token checks.

use thiserror::Error;

use crate::domain::Role;
use crate::domain::user::{AuthSession, Credentials, PublicUser, Registration};
use crate::services::token::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username or email already registered")]
    DuplicateIdentity,

    /// Unknown email and wrong password are deliberately the same variant.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Server misconfiguration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret => Self::Config(err.to_string()),
            TokenError::Encode(msg) => Self::Internal(msg),
            TokenError::Expired | TokenError::Invalid => Self::InvalidToken,
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account with role `User` and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateIdentity`] if the username or email is taken.
    async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError>;

    /// Creates an account with an explicit role, without issuing a token.
    async fn create_user(
        &self,
        registration: Registration,
        role: Role,
    ) -> Result<PublicUser, AuthError>;

    /// Verifies credentials, records the login time and issues a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email, an
    /// inactive account or a wrong password alike.
    async fn login(&self, credentials: Credentials) -> Result<AuthSession, AuthError>;

    /// Signs a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] when no signing secret is configured.
    fn issue_token(&self, user_id: &str) -> Result<String, AuthError>;

    /// Resolves a bearer token to the active user it names.
    async fn verify(&self, token: &str) -> Result<PublicUser, AuthError>;

    /// Gate on the resolved user's role.
    fn require_role(&self, user: &PublicUser, role: Role) -> Result<(), AuthError> {
        if user.role == role {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
