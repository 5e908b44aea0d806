use std::sync::Arc;
use uuid::Uuid;

use crate::monitors::clock::Clock;
use crate::monitors::model::{NewPing, Ping};
use crate::monitors::store::MonitorStore;

/// Accepts pings and advances the owning monitor's `last_ping`.
#[derive(Clone)]
pub struct PingRecorder {
    store: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
}

impl PingRecorder {
    pub fn new(store: Arc<dyn MonitorStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records one ping. `Ok(None)` means the monitor does not exist and
    /// nothing was written.
    ///
    /// The timestamp comes from the server clock, never from the caller.
    pub async fn record_ping(&self, monitor_id: Uuid, ping: NewPing) -> anyhow::Result<Option<Ping>> {
        let ping = ping.into_ping(Uuid::new_v4(), monitor_id, self.clock.now());

        let stored = self.store.record_ping(ping).await?;
        match &stored {
            Some(p) => tracing::debug!(
                monitor_id = %monitor_id,
                ping_id = %p.id,
                status = %p.status,
                "ping recorded"
            ),
            None => tracing::debug!(monitor_id = %monitor_id, "ping for unknown monitor"),
        }
        Ok(stored)
    }
}
