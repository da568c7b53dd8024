//! Background expiration sweep
//!
//! Expired pins are already excluded from every view by the collection
//! engine; this job additionally purges them from storage on a
//! schedule so they do not accumulate. The purge is best-effort: a
//! failed run only logs and the next run tries again.

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::repositories::pin::PinRepository;

/// Periodic purge of expired pins
#[derive(Clone)]
pub struct ExpirationSweeper {
    pins: PinRepository,
}

impl ExpirationSweeper {
    pub fn new(pins: PinRepository) -> Self {
        Self { pins }
    }

    /// Run one sweep now
    pub async fn sweep(&self) -> Result<u64> {
        let purged = self.pins.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!("Expiration sweep purged {} pins", purged);
        }
        Ok(purged)
    }

    /// Start the recurring sweep on a cron schedule
    pub async fn start(&self, schedule: &str) -> Result<()> {
        let sweeper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.sweep().await {
                    error!("Expiration sweep failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started expiration sweeper with schedule: {}", schedule);
        Ok(())
    }
}
