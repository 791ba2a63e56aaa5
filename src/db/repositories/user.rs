use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::is_unique_violation;
use crate::domain::user::PublicUser;
use crate::domain::{RecordId, Role};
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username,
            email: self.email,
            role: self.role,
            last_login: self.last_login,
        }
    }
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        Ok(Self {
            id: RecordId::parse(&model.id)?,
            role: model
                .role
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Corrupt role for user {}: {e}", model.id))?,
            username: model.username,
            email: model.email,
            active: model.is_active,
            last_login: model.last_login,
        })
    }
}

/// Fields for a new account; the password is hashed before storage.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
}

#[derive(Debug)]
pub enum UserInsert {
    Inserted(User),
    /// Username or email already taken.
    Duplicate,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates a user; uniqueness of username and email is left to the
    /// store's unique indexes.
    pub async fn create(
        &self,
        new_user: NewUser<'_>,
        security: &SecurityConfig,
    ) -> Result<UserInsert> {
        let password = new_user.password.to_string();
        let config = security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        let now = Utc::now();
        let id = RecordId::generate();

        let active_model = users::ActiveModel {
            id: Set(id.as_str().to_string()),
            username: Set(new_user.username.to_string()),
            email: Set(new_user.email.to_lowercase()),
            password_hash: Set(password_hash),
            role: Set(new_user.role.as_str().to_string()),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match users::Entity::insert(active_model)
            .exec_without_returning(&self.conn)
            .await
        {
            Ok(_) => Ok(UserInsert::Inserted(User {
                id,
                username: new_user.username.to_string(),
                email: new_user.email.to_lowercase(),
                role: new_user.role,
                active: true,
                last_login: None,
            })),
            Err(e) if is_unique_violation(&e) => Ok(UserInsert::Duplicate),
            Err(e) => Err(e).context("Failed to insert user"),
        }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: &RecordId) -> Result<Option<User>> {
        users::Entity::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?
            .map(User::try_from)
            .transpose()
    }

    pub async fn count_by_email(&self, email: &str) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .count(&self.conn)
            .await
            .context("Failed to count users by email")
    }

    /// Checks a password against an active account.
    ///
    /// Returns `None` both when no active account uses `email` and when the
    /// password is wrong. An unknown email still pays for one hash with the
    /// configured cost so the two cases take comparable time.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let password_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password = password.to_string();
        let config = security.clone();

        // Run CPU-intensive password verification in a blocking task
        let is_valid = task::spawn_blocking(move || {
            let Some(password_hash) = password_hash else {
                hash_password(&password, &config)?;
                return Ok(false);
            };

            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        match user {
            Some(user) if is_valid => Ok(Some(User::try_from(user)?)),
            _ => Ok(None),
        }
    }

    pub async fn touch_last_login(&self, id: &RecordId, at: DateTime<Utc>) -> Result<()> {
        let user = users::Entity::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query user for login update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.last_login = Set(Some(at));
        active.updated_at = Set(at);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_active(&self, id: &RecordId, is_active: bool) -> Result<()> {
        let user = users::Entity::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query user for status update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }
}

/// Hash a password using Argon2id with the configured cost.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn fast() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    #[test]
    fn test_hash_uses_configured_cost() {
        let hash = hash_password("secret1", &fast()).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"), "{hash}");

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"secret1", &parsed)
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = UserRepository::new(store.conn);
        let user = NewUser {
            username: "alice",
            email: "alice@example.com",
            password: "secret1",
            role: Role::User,
        };

        assert!(matches!(
            repo.create(user.clone(), &fast()).await.unwrap(),
            UserInsert::Inserted(_)
        ));
        assert!(matches!(
            repo.create(
                NewUser {
                    username: "alice2",
                    email: "ALICE@example.com",
                    ..user.clone()
                },
                &fast()
            )
            .await
            .unwrap(),
            UserInsert::Duplicate
        ));
        assert!(matches!(
            repo.create(
                NewUser {
                    email: "other@example.com",
                    ..user
                },
                &fast()
            )
            .await
            .unwrap(),
            UserInsert::Duplicate
        ));
        assert_eq!(repo.count_by_email("alice@example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_verify_credentials() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = UserRepository::new(store.conn);
        let UserInsert::Inserted(user) = repo
            .create(
                NewUser {
                    username: "bob",
                    email: "bob@example.com",
                    password: "hunter22",
                    role: Role::Admin,
                },
                &fast(),
            )
            .await
            .unwrap()
        else {
            panic!("expected insert");
        };

        let found = repo
            .verify_credentials("Bob@Example.com", "hunter22", &fast())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Admin);

        assert!(repo
            .verify_credentials("bob@example.com", "wrong", &fast())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .verify_credentials("nobody@example.com", "hunter22", &fast())
            .await
            .unwrap()
            .is_none());

        repo.set_active(&user.id, false).await.unwrap();
        assert!(repo
            .verify_credentials("bob@example.com", "hunter22", &fast())
            .await
            .unwrap()
            .is_none());
    }
}
