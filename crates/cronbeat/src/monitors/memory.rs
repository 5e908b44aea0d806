use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::monitors::model::{Monitor, MonitorPatch, NewMonitor, Ping};
use crate::monitors::store::MonitorStore;

struct Entry {
    monitor: Monitor,
    // oldest first, append only
    pings: Vec<Ping>,
}

/// In-process store. A single lock covers monitors and pings, so every
/// method is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryMonitorStore {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl MemoryMonitorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clear_pause(monitor: &mut Monitor) {
    monitor.paused = false;
    monitor.paused_at = None;
    monitor.paused_until = None;
    monitor.pause_reason = None;
}

#[async_trait]
impl MonitorStore for MemoryMonitorStore {
    async fn create_monitor(&self, new: NewMonitor, now: DateTime<Utc>) -> anyhow::Result<Monitor> {
        let monitor = new.into_monitor(Uuid::new_v4(), now);
        let mut entries = self.entries.lock().await;
        entries.insert(
            monitor.id,
            Entry {
                monitor: monitor.clone(),
                pings: Vec::new(),
            },
        );
        Ok(monitor)
    }

    async fn get_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&id).map(|e| e.monitor.clone()))
    }

    async fn list_monitors(&self) -> anyhow::Result<Vec<Monitor>> {
        let entries = self.entries.lock().await;
        let mut out: Vec<Monitor> = entries.values().map(|e| e.monitor.clone()).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn update_monitor(
        &self,
        id: Uuid,
        patch: MonitorPatch,
    ) -> anyhow::Result<Option<Monitor>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.get_mut(&id).map(|e| {
            patch.apply(&mut e.monitor);
            e.monitor.clone()
        }))
    }

    async fn delete_monitor(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(&id).is_some())
    }

    async fn record_ping(&self, ping: Ping) -> anyhow::Result<Option<Ping>> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&ping.monitor_id) else {
            return Ok(None);
        };
        entry.monitor.last_ping = Some(ping.timestamp);
        entry.pings.push(ping.clone());
        Ok(Some(ping))
    }

    async fn recent_pings(&self, monitor_id: Uuid, limit: i64) -> anyhow::Result<Vec<Ping>> {
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(&monitor_id) else {
            return Ok(Vec::new());
        };

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(entry.pings.iter().rev().take(limit).cloned().collect())
    }

    async fn count_pings(&self) -> anyhow::Result<i64> {
        let entries = self.entries.lock().await;
        Ok(entries.values().map(|e| e.pings.len() as i64).sum())
    }

    async fn pause_monitor(
        &self,
        id: Uuid,
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Monitor>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.get_mut(&id).map(|e| {
            let m = &mut e.monitor;
            m.paused = true;
            m.paused_at = Some(now);
            m.pause_reason = reason;
            m.paused_until = until;
            m.clone()
        }))
    }

    async fn resume_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.get_mut(&id).map(|e| {
            clear_pause(&mut e.monitor);
            e.monitor.clone()
        }))
    }

    async fn resume_expired(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>> {
        let mut entries = self.entries.lock().await;
        let mut resumed = Vec::new();
        for entry in entries.values_mut() {
            let m = &mut entry.monitor;
            let expired = m.paused && m.paused_until.is_some_and(|until| until <= now);
            if expired {
                clear_pause(m);
                resumed.push(m.id);
            }
        }
        resumed.sort();
        Ok(resumed)
    }
}
