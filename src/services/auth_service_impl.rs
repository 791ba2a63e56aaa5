//! `SeaORM` implementation of the `AuthService` trait.

use crate::config::AuthConfig;
use crate::db::{NewUser, Store, UserInsert};
use crate::domain::user::{AuthSession, Credentials, PublicUser, Registration};
use crate::domain::{RecordId, Role};
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::token::TokenSigner;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

pub struct SeaOrmAuthService {
    store: Store,
    signer: TokenSigner,
    config: AuthConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, config: AuthConfig) -> Self {
        Self {
            store,
            signer: TokenSigner::new(config.jwt_secret.as_deref(), config.token_ttl_hours),
            config,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        // Refuse before writing anything when tokens cannot be issued.
        if self.config.jwt_secret.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::Config(
                "Token signing secret is not configured".to_string(),
            ));
        }

        let user = self.create_user(registration, Role::User).await?;
        let token = self.issue_token(user.id.as_str())?;

        Ok(AuthSession { token, user })
    }

    async fn create_user(
        &self,
        registration: Registration,
        role: Role,
    ) -> Result<PublicUser, AuthError> {
        let Registration {
            username,
            email,
            password,
        } = registration;

        let outcome = self
            .store
            .create_user(
                NewUser {
                    username: &username,
                    email: &email,
                    password: &password,
                    role,
                },
                &self.config.security,
            )
            .await?;
        drop(password);

        match outcome {
            UserInsert::Inserted(user) => {
                info!(user_id = %user.id, role = %role, "User registered");
                Ok(user.into_public())
            }
            UserInsert::Duplicate => Err(AuthError::DuplicateIdentity),
        }
    }

    async fn login(&self, credentials: Credentials) -> Result<AuthSession, AuthError> {
        let user = self
            .store
            .verify_user_credentials(
                &credentials.email,
                &credentials.password,
                &self.config.security,
            )
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now();
        let token = self.issue_token(user.id.as_str())?;
        self.store.touch_user_last_login(&user.id, now).await?;

        let mut user = user.into_public();
        user.last_login = Some(now);

        Ok(AuthSession { token, user })
    }

    fn issue_token(&self, user_id: &str) -> Result<String, AuthError> {
        Ok(self.signer.issue(user_id, Utc::now())?)
    }

    async fn verify(&self, token: &str) -> Result<PublicUser, AuthError> {
        let claims = self.signer.decode(token)?;
        let id = RecordId::parse(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        match self.store.get_user(&id).await? {
            Some(user) if user.active => Ok(user.into_public()),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    async fn service(secret: Option<&str>) -> (SeaOrmAuthService, Store) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let config = AuthConfig {
            jwt_secret: secret.map(str::to_string),
            token_ttl_hours: 24,
            security: SecurityConfig {
                argon2_memory_cost_kib: 1024,
                argon2_time_cost: 1,
                argon2_parallelism: 1,
            },
        };
        (SeaOrmAuthService::new(store.clone(), config), store)
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_token_verifies_to_new_user() {
        let (auth, _) = service(Some("secret")).await;
        let session = auth
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(session.user.role, Role::User);
        let user = auth.verify(&session.token).await.unwrap();
        assert_eq!(user.id, session.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_one_user() {
        let (auth, store) = service(Some("secret")).await;
        auth.register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = auth
            .register(registration("alice2", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity));
        assert_eq!(
            store.count_users_by_email("alice@example.com").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (auth, _) = service(Some("secret")).await;
        auth.register(registration("bob", "bob@example.com"))
            .await
            .unwrap();

        let wrong_password = auth
            .login(Credentials {
                email: "bob@example.com".to_string(),
                password: "nope-nope".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(Credentials {
                email: "ghost@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (auth, store) = service(Some("secret")).await;
        let session = auth
            .register(registration("carol", "carol@example.com"))
            .await
            .unwrap();
        assert!(session.user.last_login.is_none());

        let login = auth
            .login(Credentials {
                email: "carol@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();
        assert!(login.user.last_login.is_some());

        let stored = store.get_user(&login.user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_inactive_user_token_rejected() {
        let (auth, store) = service(Some("secret")).await;
        let session = auth
            .register(registration("dave", "dave@example.com"))
            .await
            .unwrap();

        store.set_user_active(&session.user.id, false).await.unwrap();
        assert!(matches!(
            auth.verify(&session.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_rejected() {
        let (auth, _) = service(Some("secret")).await;
        let token = auth.issue_token("0123456789abcdef01234567").unwrap();
        assert!(matches!(
            auth.verify(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_missing_secret_is_config_error() {
        let (auth, store) = service(None).await;
        assert!(matches!(
            auth.issue_token("0123456789abcdef01234567"),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            auth.register(registration("erin", "erin@example.com")).await,
            Err(AuthError::Config(_))
        ));
        assert_eq!(
            store.count_users_by_email("erin@example.com").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_require_role() {
        let (auth, _) = service(Some("secret")).await;
        let admin = auth
            .create_user(registration("root", "root@example.com"), Role::Admin)
            .await
            .unwrap();
        let session = auth
            .register(registration("user", "user@example.com"))
            .await
            .unwrap();

        assert!(auth.require_role(&admin, Role::Admin).is_ok());
        assert!(matches!(
            auth.require_role(&session.user, Role::Admin),
            Err(AuthError::Forbidden)
        ));
    }
}
