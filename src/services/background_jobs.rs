use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::services::poll_service;
use crate::store::PollStore;

#[derive(Clone)]
pub struct BackgroundJobsService {
    store: Arc<dyn PollStore>,
    sweep_interval: Duration,
}

impl BackgroundJobsService {
    pub fn new(store: Arc<dyn PollStore>, sweep_interval: Duration) -> Self {
        Self {
            store,
            sweep_interval,
        }
    }

    /// Start all background jobs.
    pub fn start_all_jobs(&self) {
        let jobs_service = self.clone();

        // Eagerly close expired polls so status queries that do not
        // recompute client-side still see accurate data. The lazy
        // effective-status check covers the window between runs.
        tokio::spawn(async move {
            let mut interval = interval(jobs_service.sweep_interval);
            loop {
                interval.tick().await;
                match poll_service::sweep_expired(jobs_service.store.as_ref(), Utc::now()).await {
                    Ok(0) => {}
                    Ok(swept) => tracing::info!("Closed {} expired polls", swept),
                    Err(e) => tracing::error!("Failed to sweep expired polls: {}", e),
                }
            }
        });

        tracing::info!("Background jobs started successfully");
    }
}
