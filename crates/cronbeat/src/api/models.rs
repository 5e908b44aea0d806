// crates/cronbeat/src/api/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitors::status::{compute_status, next_expected_ping, MonitorStatus};
use crate::monitors::Monitor;

/// A monitor as the API shows it, with status derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorView {
    pub id: Uuid,
    pub name: String,
    pub schedule: String,
    pub interval_minutes: i32,
    pub grace_minutes: i32,
    pub status: MonitorStatus,

    pub last_ping: Option<DateTime<Utc>>,
    pub next_expected_ping: Option<DateTime<Utc>>,

    pub paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_until: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl MonitorView {
    pub fn new(m: Monitor, now: DateTime<Utc>) -> Self {
        Self {
            status: compute_status(&m, now),
            interval_minutes: m.effective_interval_minutes(),
            next_expected_ping: next_expected_ping(&m),
            id: m.id,
            name: m.name,
            schedule: m.schedule,
            grace_minutes: m.grace_minutes,
            last_ping: m.last_ping,
            paused: m.paused,
            paused_at: m.paused_at,
            paused_until: m.paused_until,
            pause_reason: m.pause_reason,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonitorSummary {
    pub id: Uuid,
    pub name: String,
    pub status: MonitorStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PingRequest {
    pub success: Option<bool>,
    pub duration: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub ping_id: Uuid,
    pub monitor: MonitorSummary,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub id: Uuid,
    pub reason: Option<String>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateMonitorRequest {
    pub name: String,
    pub schedule: String,
    pub grace_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMonitorRequest {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub grace_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMonitorsQuery {
    pub stats: Option<bool>,
}
