use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitors::model::Monitor;
use crate::monitors::status::{compute_status, MonitorStatus};
use crate::monitors::store::MonitorStore;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStats {
    pub total: i64,
    pub healthy: i64,
    pub late: i64,
    pub down: i64,
    pub paused: i64,
    pub total_pings: i64,
}

pub fn tally(monitors: &[Monitor], now: DateTime<Utc>, total_pings: i64) -> MonitorStats {
    let mut stats = MonitorStats {
        total_pings,
        ..MonitorStats::default()
    };

    for m in monitors {
        stats.total += 1;
        match compute_status(m, now) {
            MonitorStatus::Healthy => stats.healthy += 1,
            MonitorStatus::Late => stats.late += 1,
            MonitorStatus::Down => stats.down += 1,
            MonitorStatus::Paused => stats.paused += 1,
        }
    }
    stats
}

pub async fn snapshot(store: &dyn MonitorStore, now: DateTime<Utc>) -> anyhow::Result<MonitorStats> {
    let monitors = store.list_monitors().await?;
    let total_pings = store.count_pings().await?;
    Ok(tally(&monitors, now, total_pings))
}
