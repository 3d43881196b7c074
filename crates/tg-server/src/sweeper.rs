use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::store::ArtifactStore;

/// Recurring background task deleting artifact directories older than the
/// retention window. Runs independently of job execution and takes no lock
/// that could block a submission.
pub fn spawn(store: ArtifactStore, interval: Duration, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&store, Utc::now(), retention).await;
        }
    })
}

/// One sweep pass at an explicit instant, so tests can drive the clock.
pub async fn sweep_once(store: &ArtifactStore, now: DateTime<Utc>, retention: Duration) {
    let expired = match store.list_expired(now, retention).await {
        Ok(expired) => expired,
        Err(err) => {
            error!(error = %err, "artifact sweep failed to list directories");
            return;
        }
    };

    for job_id in expired {
        match store.purge(&job_id).await {
            Ok(()) => info!(job_id, "expired artifacts purged"),
            Err(err) => error!(job_id, error = %err, "failed to purge expired artifacts"),
        }
    }
}
