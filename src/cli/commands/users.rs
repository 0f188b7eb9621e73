//! Create user command handler

use crate::config::Config;
use crate::db::repositories::user::UserFlagChange;
use crate::domain::Role;
use crate::state::SharedState;

pub async fn cmd_create_user(
    config: Config,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let user = state
        .auth_service
        .register(username, email, password)
        .await
        .map_err(|e| anyhow::anyhow!("Could not create user: {e}"))?;

    if role != Role::User {
        state
            .store
            .users()
            .update_flags(user.id, UserFlagChange::Role(role))
            .await?;
    }

    println!("✓ Created user '{}' (ID {}) with role {}", user.username, user.id, role.as_str());
    Ok(())
}
