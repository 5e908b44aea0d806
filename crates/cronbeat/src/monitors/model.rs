use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::monitors::schedule::parse_schedule;

pub const DEFAULT_GRACE_MINUTES: i32 = 15;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Monitor {
    pub id: Uuid,
    pub name: String,
    pub schedule: String,
    pub interval_minutes: Option<i32>,
    pub grace_minutes: i32,
    pub last_ping: Option<DateTime<Utc>>,

    pub paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_until: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Monitor {
    /// Stored interval, or the schedule re-parsed when the column is empty.
    pub fn effective_interval_minutes(&self) -> i32 {
        match self.interval_minutes {
            Some(m) if m > 0 => m,
            _ => parse_schedule(&self.schedule),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMonitor {
    pub name: String,
    pub schedule: String,
    pub grace_minutes: i32,
}

impl NewMonitor {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            grace_minutes: DEFAULT_GRACE_MINUTES,
        }
    }

    pub fn with_grace(mut self, grace_minutes: i32) -> Self {
        self.grace_minutes = grace_minutes;
        self
    }

    /// Builds the row a store persists. `interval_minutes` always comes from
    /// the schedule text.
    pub fn into_monitor(self, id: Uuid, created_at: DateTime<Utc>) -> Monitor {
        let interval = parse_schedule(&self.schedule);
        Monitor {
            id,
            name: self.name,
            schedule: self.schedule,
            interval_minutes: Some(interval),
            grace_minutes: self.grace_minutes,
            last_ping: None,
            paused: false,
            paused_at: None,
            paused_until: None,
            pause_reason: None,
            created_at,
        }
    }
}

/// Partial update. A schedule change re-derives `interval_minutes`.
#[derive(Debug, Clone, Default)]
pub struct MonitorPatch {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub grace_minutes: Option<i32>,
}

impl MonitorPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.schedule.is_none() && self.grace_minutes.is_none()
    }

    pub fn apply(&self, monitor: &mut Monitor) {
        if let Some(name) = &self.name {
            monitor.name = name.clone();
        }
        if let Some(schedule) = &self.schedule {
            monitor.schedule = schedule.clone();
            monitor.interval_minutes = Some(parse_schedule(schedule));
        }
        if let Some(grace) = self.grace_minutes {
            monitor.grace_minutes = grace;
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ping {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
    pub ip: Option<String>,
}

impl Ping {
    pub fn is_success(&self) -> bool {
        self.status == PingStatus::Success.as_str()
    }
}

/// What a caller reports; id and timestamp are assigned server side.
#[derive(Debug, Clone)]
pub struct NewPing {
    pub success: bool,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
    pub ip: Option<String>,
}

impl Default for NewPing {
    fn default() -> Self {
        Self {
            success: true,
            duration_ms: None,
            message: None,
            ip: None,
        }
    }
}

impl NewPing {
    pub fn into_ping(self, id: Uuid, monitor_id: Uuid, timestamp: DateTime<Utc>) -> Ping {
        let status = if self.success {
            PingStatus::Success
        } else {
            PingStatus::Failure
        };
        Ping {
            id,
            monitor_id,
            timestamp,
            status: status.as_str().to_string(),
            duration_ms: self.duration_ms,
            message: self.message,
            ip: self.ip,
        }
    }
}

pub enum PingStatus {
    Success,
    Failure,
}

impl PingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PingStatus::Success => "success",
            PingStatus::Failure => "failure",
        }
    }
}
