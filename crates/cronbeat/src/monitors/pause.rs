use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::monitors::clock::Clock;
use crate::monitors::model::Monitor;
use crate::monitors::store::MonitorStore;

/// Moves monitors between active and paused.
#[derive(Clone)]
pub struct PauseController {
    store: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
}

impl PauseController {
    pub fn new(store: Arc<dyn MonitorStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Pauses the monitor. Pausing again restarts `paused_at` and overwrites
    /// reason and `until`.
    pub async fn pause(
        &self,
        id: Uuid,
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<Monitor>> {
        let monitor = self
            .store
            .pause_monitor(id, reason, until, self.clock.now())
            .await?;
        if monitor.is_some() {
            tracing::info!(monitor_id = %id, until = ?until, "monitor paused");
        }
        Ok(monitor)
    }

    /// Returns the monitor to active. Resuming an active monitor succeeds
    /// without changing anything.
    pub async fn resume(&self, id: Uuid) -> anyhow::Result<Option<Monitor>> {
        let monitor = self.store.resume_monitor(id).await?;
        if monitor.is_some() {
            tracing::info!(monitor_id = %id, "monitor resumed");
        }
        Ok(monitor)
    }

    /// Ends every timed pause whose `paused_until` is at or before `now`.
    ///
    /// Idempotent: a second call with the same `now` resumes nothing.
    pub async fn sweep_expired_pauses(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>> {
        let resumed = self.store.resume_expired(now).await?;
        if !resumed.is_empty() {
            tracing::info!(count = resumed.len(), "auto-resumed expired pauses");
        }
        Ok(resumed)
    }

    pub async fn sweep_now(&self) -> anyhow::Result<Vec<Uuid>> {
        self.sweep_expired_pauses(self.clock.now()).await
    }
}

/// Runs the pause sweep on a fixed interval until the task is dropped.
pub async fn run_pause_sweeper(controller: PauseController, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = controller.sweep_now().await {
            // a failed sweep is retried on the next tick
            tracing::warn!(error = %e, "pause sweep failed");
        }
    }
}
