use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::monitors::model::Monitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Healthy,
    Late,
    Down,
    Paused,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Healthy => "healthy",
            MonitorStatus::Late => "late",
            MonitorStatus::Down => "down",
            MonitorStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the next ping is due, if the monitor has ever pinged.
pub fn next_expected_ping(monitor: &Monitor) -> Option<DateTime<Utc>> {
    monitor
        .last_ping
        .map(|last| last + Duration::minutes(monitor.effective_interval_minutes() as i64))
}

/// Derives the current status from the monitor's fields and `now`.
///
/// A paused monitor stays paused even after `paused_until` has passed; only
/// the pause sweep ends a timed pause.
pub fn compute_status(monitor: &Monitor, now: DateTime<Utc>) -> MonitorStatus {
    if monitor.paused {
        return MonitorStatus::Paused;
    }

    let Some(expected_next) = next_expected_ping(monitor) else {
        return MonitorStatus::Down;
    };

    let overrun = now - expected_next;
    let grace = Duration::minutes(monitor.grace_minutes as i64);

    if overrun > grace {
        MonitorStatus::Down
    } else if overrun > Duration::zero() {
        MonitorStatus::Late
    } else {
        MonitorStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitors::model::NewMonitor;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn monitor(schedule: &str, grace: i32, last_ping: Option<DateTime<Utc>>) -> Monitor {
        let mut m = NewMonitor::new("backup", schedule)
            .with_grace(grace)
            .into_monitor(Uuid::new_v4(), t0() - Duration::days(1));
        m.last_ping = last_ping;
        m
    }

    #[test]
    fn never_pinged_is_down() {
        let m = monitor("every 5 minutes", 10, None);
        assert_eq!(compute_status(&m, t0()), MonitorStatus::Down);
    }

    #[test]
    fn boundaries_follow_interval_and_grace() {
        let m = monitor("every 5 minutes", 10, Some(t0()));

        assert_eq!(compute_status(&m, t0()), MonitorStatus::Healthy);
        assert_eq!(
            compute_status(&m, t0() + Duration::minutes(5)),
            MonitorStatus::Healthy
        );
        assert_eq!(
            compute_status(&m, t0() + Duration::minutes(5) + Duration::seconds(1)),
            MonitorStatus::Late
        );
        assert_eq!(
            compute_status(&m, t0() + Duration::minutes(15)),
            MonitorStatus::Late
        );
        assert_eq!(
            compute_status(&m, t0() + Duration::minutes(15) + Duration::seconds(1)),
            MonitorStatus::Down
        );
    }

    #[test]
    fn paused_wins_even_after_pause_expired() {
        let mut m = monitor("every minute", 1, Some(t0()));
        m.paused = true;
        m.paused_at = Some(t0());
        m.paused_until = Some(t0() + Duration::minutes(1));

        assert_eq!(
            compute_status(&m, t0() + Duration::days(3)),
            MonitorStatus::Paused
        );

        m.last_ping = None;
        assert_eq!(compute_status(&m, t0()), MonitorStatus::Paused);
    }

    #[test]
    fn missing_interval_falls_back_to_schedule() {
        let mut m = monitor("every 2 hours", 15, Some(t0()));
        m.interval_minutes = None;

        assert_eq!(
            next_expected_ping(&m),
            Some(t0() + Duration::minutes(120))
        );
        assert_eq!(
            compute_status(&m, t0() + Duration::minutes(130)),
            MonitorStatus::Late
        );
    }

    #[test]
    fn ping_outcome_does_not_matter() {
        // status is computed from timing fields only; a monitor whose last
        // ping reported failure is still healthy while on schedule
        let m = monitor("daily", 15, Some(t0()));
        assert_eq!(
            compute_status(&m, t0() + Duration::hours(1)),
            MonitorStatus::Healthy
        );
    }
}
