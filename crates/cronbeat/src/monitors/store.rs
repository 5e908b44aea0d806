use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::monitors::model::{Monitor, MonitorPatch, NewMonitor, Ping};

/// Durable home for monitors and their pings.
///
/// Lookups by id return `Ok(None)` when the monitor does not exist; `Err` is
/// reserved for storage failures.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn create_monitor(&self, new: NewMonitor, now: DateTime<Utc>) -> anyhow::Result<Monitor>;

    async fn get_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>>;

    /// All monitors, newest first.
    async fn list_monitors(&self) -> anyhow::Result<Vec<Monitor>>;

    async fn update_monitor(&self, id: Uuid, patch: MonitorPatch)
        -> anyhow::Result<Option<Monitor>>;

    /// Removes the monitor and every ping it owns. Returns false if absent.
    async fn delete_monitor(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Inserts `ping` and sets the monitor's `last_ping` to its timestamp as
    /// one unit. Returns `None`, writing nothing, if the monitor is unknown.
    async fn record_ping(&self, ping: Ping) -> anyhow::Result<Option<Ping>>;

    /// Most recent pings, newest first.
    async fn recent_pings(&self, monitor_id: Uuid, limit: i64) -> anyhow::Result<Vec<Ping>>;

    async fn count_pings(&self) -> anyhow::Result<i64>;

    /// Marks the monitor paused. `paused_at` keeps its first value when the
    /// monitor is already paused; reason and until are overwritten.
    async fn pause_monitor(
        &self,
        id: Uuid,
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Monitor>>;

    /// Clears every pause field. A no-op on an active monitor.
    async fn resume_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>>;

    /// Resumes every timed pause with `paused_until <= now` and returns the
    /// ids it touched. Indefinite pauses are left alone.
    async fn resume_expired(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>>;
}
