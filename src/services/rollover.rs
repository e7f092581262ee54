use tokio_cron_scheduler::{Job, JobScheduler};

use crate::engine::SharedEngine;

/// Every day at midnight UTC.
pub const ROLLOVER_SCHEDULE: &str = "0 0 0 * * *";

/// Moves the stats day forward once a day so the "today" counters start
/// from zero. Ban expiry is not swept here; it stays lazy.
pub struct StatsRolloverService {
    engine: SharedEngine,
    scheduler: JobScheduler,
}

impl StatsRolloverService {
    pub async fn new(engine: SharedEngine) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self { engine, scheduler })
    }

    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let engine = self.engine.clone();

        let rollover_job = Job::new_async(ROLLOVER_SCHEDULE, move |_uuid, _l| {
            let engine = engine.clone();
            Box::pin(async move {
                roll_now(&engine).await;
            })
        })?;

        self.scheduler.add(rollover_job).await?;
        self.scheduler.start().await?;

        tracing::info!("Stats rollover service started - rolling daily counters at 00:00 UTC");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

/// Rolls the stats day under the engine lock.
pub async fn roll_now(engine: &SharedEngine) {
    let mut engine = engine.lock().await;
    let stats = engine.roll_stats_day();
    tracing::info!(
        "Stats rolled to {}: {} users, {} tasks ({} completed)",
        stats.day,
        stats.total_users,
        stats.total_tasks,
        stats.completed_tasks
    );
}
