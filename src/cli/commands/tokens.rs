//! Token maintenance command handlers

use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_cleanup_tokens(config: Config, retention_days: Option<i64>) -> anyhow::Result<()> {
    let retention_days = retention_days.unwrap_or(config.security.tokens.cleanup_retention_days);
    if retention_days < 0 {
        anyhow::bail!("Retention days cannot be negative");
    }

    let state = SharedState::new(config).await?;
    let deleted = state.tokens.cleanup(retention_days).await?;

    println!("✓ Deleted {deleted} stale tokens (retention: {retention_days} days)");
    Ok(())
}

pub async fn cmd_revoke_user(config: Config, username: &str) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let Some(user) = state.store.users().get_by_username(username).await? else {
        println!("User '{username}' not found.");
        return Ok(());
    };

    let revoked = state.tokens.revoke_all_for_user(user.id, "cli_revoke").await?;

    println!("✓ Revoked {revoked} tokens for '{}'", user.username);
    Ok(())
}
