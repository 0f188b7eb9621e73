use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::MaintenanceConfig;
use crate::services::maintenance::MaintenanceService;

pub struct Scheduler {
    maintenance: Arc<MaintenanceService>,
    config: MaintenanceConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(maintenance: Arc<MaintenanceService>, config: MaintenanceConfig) -> Self {
        Self {
            maintenance,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Runs the maintenance job on its cron schedule until [`Self::stop`] is called.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Maintenance scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;

        let mut sched = JobScheduler::new().await?;

        let maintenance = Arc::clone(&self.maintenance);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(self.config.cleanup_cron.as_str(), move |_uuid, _lock| {
            let maintenance = Arc::clone(&maintenance);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                let start = std::time::Instant::now();
                info!(event = "job_started", job_name = "maintenance", "Starting scheduled maintenance");

                if let Err(e) = maintenance.run_once().await {
                    error!(event = "job_failed", job_name = "maintenance", error = %e, "Scheduled maintenance failed");
                }

                info!(
                    event = "job_finished",
                    job_name = "maintenance",
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Scheduled maintenance finished"
                );
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!(cron = %self.config.cleanup_cron, "Maintenance scheduler running");

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
