use crate::db::Store;
use crate::domain::events::AppEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::error;

/// Persists audit events from the event bus into `system_logs`.
pub struct LogService {
    store: Store,
    event_bus: broadcast::Sender<AppEvent>,
}

impl LogService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<AppEvent>) -> Self {
        Self { store, event_bus }
    }

    pub fn start_listener(self: Arc<Self>) {
        let mut rx = self.event_bus.subscribe();
        let service = self;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = service.handle_event(&event).await {
                            error!(error = %e, event = event.name(), "Failed to save log");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        error!(count, "Log listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Log listener event bus closed");
                        break;
                    }
                }
            }
        });
    }

    pub async fn handle_event(&self, event: &AppEvent) -> anyhow::Result<()> {
        let (level, message) = describe(event);
        let details = serde_json::to_string(event)?;

        self.store
            .add_log(event.name(), level, &message, Some(details))
            .await
    }
}

/// Level and human-readable message for an event.
fn describe(event: &AppEvent) -> (&'static str, String) {
    match event {
        AppEvent::UserRegistered { username, .. } => {
            ("info", format!("User registered: {username}"))
        }
        AppEvent::LoginSucceeded { user_id, .. } => {
            ("info", format!("User {user_id} logged in"))
        }
        AppEvent::LoginFailed { identifier, .. } => {
            ("warn", format!("Failed login for '{identifier}'"))
        }
        AppEvent::LoginLockedOut {
            ip,
            retry_after_seconds,
        } => (
            "warn",
            format!("Login locked for {ip} ({retry_after_seconds}s)"),
        ),
        AppEvent::PasswordChanged { user_id } => {
            ("info", format!("User {user_id} changed their password"))
        }
        AppEvent::TokenReuseDetected {
            user_id, revoked, ..
        } => (
            "error",
            format!("Refresh token reuse for user {user_id}, {revoked} tokens revoked"),
        ),
        AppEvent::TokenFamilyRevoked {
            reason, revoked, ..
        } => (
            "info",
            format!("Token family revoked ({reason}): {revoked} tokens"),
        ),
        AppEvent::UserTokensRevoked {
            user_id,
            reason,
            revoked,
        } => (
            "info",
            format!("Revoked {revoked} tokens of user {user_id} ({reason})"),
        ),
        AppEvent::TokensCleanedUp { deleted } => {
            ("info", format!("Token cleanup removed {deleted} rows"))
        }
        AppEvent::LogsPruned { deleted } => ("info", format!("Pruned {deleted} log entries")),
        AppEvent::AiRequestCompleted {
            request_id,
            request_type,
            ..
        } => (
            "success",
            format!("AI request {request_id} ({request_type}) completed"),
        ),
        AppEvent::AiRequestFailed {
            request_id,
            request_type,
            error,
            ..
        } => (
            "warn",
            format!("AI request {request_id} ({request_type}) failed: {error}"),
        ),
        AppEvent::BulkActionApplied {
            target,
            action,
            processed,
            ..
        } => (
            "info",
            format!("Bulk {action} on {target}: {processed} processed"),
        ),
        AppEvent::Error { message } => ("error", message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_persisted_with_details() {
        let store = Store::in_memory().await.unwrap();
        let (tx, _rx) = broadcast::channel(8);
        let service = LogService::new(store.clone(), tx);

        service
            .handle_event(&AppEvent::TokenReuseDetected {
                user_id: 7,
                family_id: "fam".to_string(),
                revoked: 3,
            })
            .await
            .unwrap();

        let (logs, total) = store.logs().get_logs(1, 10, None, None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].event_type, "TokenReuseDetected");
        assert_eq!(logs[0].level, "error");
        assert!(logs[0].details.as_deref().unwrap().contains("\"family_id\":\"fam\""));
    }

    #[test]
    fn test_describe_levels() {
        assert_eq!(
            describe(&AppEvent::LoginFailed {
                identifier: "bob".to_string(),
                ip: None
            })
            .0,
            "warn"
        );
        assert_eq!(describe(&AppEvent::TokensCleanedUp { deleted: 2 }).0, "info");
    }
}
