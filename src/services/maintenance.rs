use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::db::Store;
use crate::domain::events::AppEvent;
use crate::services::token_service::ApiTokenService;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MaintenanceReport {
    pub tokens_deleted: u64,
    pub logs_deleted: u64,
}

/// Periodic housekeeping: stale tokens and old audit rows.
pub struct MaintenanceService {
    store: Store,
    tokens: Arc<ApiTokenService>,
    event_bus: broadcast::Sender<AppEvent>,
    token_retention_days: i64,
    log_retention_days: i64,
}

impl MaintenanceService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<ApiTokenService>,
        event_bus: broadcast::Sender<AppEvent>,
        token_retention_days: i64,
        log_retention_days: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            event_bus,
            token_retention_days,
            log_retention_days,
        }
    }

    pub async fn run_once(&self) -> anyhow::Result<MaintenanceReport> {
        let tokens_deleted = self.tokens.cleanup(self.token_retention_days).await?;

        let logs_deleted = self.store.prune_logs(self.log_retention_days).await?;
        if logs_deleted > 0 {
            let _ = self.event_bus.send(AppEvent::LogsPruned {
                deleted: logs_deleted,
            });
        }

        info!(tokens_deleted, logs_deleted, "Maintenance finished");

        Ok(MaintenanceReport {
            tokens_deleted,
            logs_deleted,
        })
    }
}
