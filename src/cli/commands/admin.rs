use crate::config::Config;
use crate::db::Store;
use crate::domain::Role;
use crate::domain::user::RegisterRequest;
use crate::domain::validation::Validate;
use crate::services::{AuthError, AuthService, SeaOrmAuthService};

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let registration = RegisterRequest {
        username: Some(username.to_string()),
        email: Some(email.to_string()),
        password: Some(password.to_string()),
    }
    .validate()
    .map_err(|e| anyhow::anyhow!("Invalid admin account: {e}"))?;

    let store = Store::new(&config.general.database_path).await?;
    let auth = SeaOrmAuthService::new(store, config.auth.clone());

    match auth.create_user(registration, Role::Admin).await {
        Ok(user) => {
            println!("Created admin '{}' ({})", user.username, user.id);
            Ok(())
        }
        Err(AuthError::DuplicateIdentity) => {
            anyhow::bail!("A user with that username or email already exists")
        }
        Err(e) => Err(anyhow::anyhow!("Failed to create admin: {e}")),
    }
}
