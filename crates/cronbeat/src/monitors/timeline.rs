use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::monitors::model::{Monitor, Ping};
use crate::monitors::status::{compute_status, MonitorStatus};
use crate::monitors::store::MonitorStore;

/// Default number of markers (and of pings fetched) for a timeline.
pub const DEFAULT_TIMELINE_LIMIT: usize = 75;

#[derive(Debug, Serialize)]
pub struct MonitorTimeline {
    pub monitor_id: Uuid,
    pub status: MonitorStatus,
    pub generated_at: DateTime<Utc>,
    pub markers: Vec<TimelineMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TimelineMarker {
    Ping {
        at: DateTime<Utc>,
        id: Uuid,
        success: bool,
        duration_ms: Option<i64>,
        message: Option<String>,
    },
    /// Past the expected ping but still inside grace.
    Late { at: DateTime<Utc> },
    /// A cycle that appears to have been skipped.
    Missed { at: DateTime<Utc> },
}

impl TimelineMarker {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineMarker::Ping { at, .. }
            | TimelineMarker::Late { at }
            | TimelineMarker::Missed { at } => *at,
        }
    }
}

struct Markers {
    out: Vec<TimelineMarker>,
    max_len: usize,
}

impl Markers {
    fn is_full(&self) -> bool {
        self.out.len() >= self.max_len
    }

    fn push(&mut self, marker: TimelineMarker) {
        if !self.is_full() {
            self.out.push(marker);
        }
    }

    /// `count` missed markers at `from + k * interval`, newest first.
    fn push_missed(&mut self, from: DateTime<Utc>, interval_ms: i64, count: i64) {
        for k in (1..=count).rev() {
            if self.is_full() {
                return;
            }
            self.push(TimelineMarker::Missed {
                at: from + Duration::milliseconds(k * interval_ms),
            });
        }
    }
}

/// Builds the display timeline for a monitor.
///
/// `pings` must be newest first. Leading markers describe the gap between
/// `now` and the last ping: `floor((gap - grace) / interval)` missed markers
/// once the gap exceeds interval + grace, otherwise a single late marker once
/// it exceeds the interval. Between two recorded pings further apart than
/// interval + grace, `ceil(gap / interval) - 1` missed markers are inserted.
/// The two counts are deliberately computed differently.
pub fn reconstruct_timeline(
    monitor: &Monitor,
    pings: &[Ping],
    now: DateTime<Utc>,
    max_len: usize,
) -> Vec<TimelineMarker> {
    let interval_ms = monitor.effective_interval_minutes() as i64 * 60_000;
    let grace_ms = monitor.grace_minutes as i64 * 60_000;

    let mut markers = Markers {
        out: Vec::with_capacity(max_len.min(pings.len() + 1)),
        max_len,
    };

    if !monitor.paused {
        if let Some(last) = monitor.last_ping {
            let gap = (now - last).num_milliseconds();
            if gap > interval_ms + grace_ms {
                let count = (gap - grace_ms) / interval_ms;
                markers.push_missed(last, interval_ms, count);
            } else if gap > interval_ms {
                markers.push(TimelineMarker::Late {
                    at: last + Duration::milliseconds(interval_ms),
                });
            }
        }
    }

    for (i, ping) in pings.iter().enumerate() {
        if markers.is_full() {
            break;
        }
        markers.push(TimelineMarker::Ping {
            at: ping.timestamp,
            id: ping.id,
            success: ping.is_success(),
            duration_ms: ping.duration_ms,
            message: ping.message.clone(),
        });

        let Some(older) = pings.get(i + 1) else {
            continue;
        };
        let gap = (ping.timestamp - older.timestamp).num_milliseconds();
        if gap > interval_ms + grace_ms {
            // ceil(gap / interval) - 1
            let count = (gap + interval_ms - 1) / interval_ms - 1;
            markers.push_missed(older.timestamp, interval_ms, count);
        }
    }

    markers.out
}

/// Loads a monitor with its recent pings and builds its timeline.
pub async fn build_timeline(
    store: &dyn MonitorStore,
    monitor_id: Uuid,
    now: DateTime<Utc>,
    limit: usize,
) -> anyhow::Result<Option<MonitorTimeline>> {
    let monitor = match store.get_monitor(monitor_id).await? {
        Some(m) => m,
        None => return Ok(None),
    };

    let pings = store.recent_pings(monitor_id, limit as i64).await?;
    let markers = reconstruct_timeline(&monitor, &pings, now, limit);

    Ok(Some(MonitorTimeline {
        monitor_id: monitor.id,
        status: compute_status(&monitor, now),
        generated_at: now,
        markers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitors::model::{NewMonitor, NewPing};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn monitor(last_ping: Option<DateTime<Utc>>) -> Monitor {
        // 10 minute interval, 5 minute grace
        let mut m = NewMonitor::new("etl", "every 10 minutes")
            .with_grace(5)
            .into_monitor(Uuid::new_v4(), t0() - Duration::days(1));
        m.last_ping = last_ping;
        m
    }

    fn ping(monitor: &Monitor, at: DateTime<Utc>, success: bool) -> Ping {
        NewPing {
            success,
            ..NewPing::default()
        }
        .into_ping(Uuid::new_v4(), monitor.id, at)
    }

    fn kinds(markers: &[TimelineMarker]) -> Vec<&'static str> {
        markers
            .iter()
            .map(|m| match m {
                TimelineMarker::Ping { .. } => "ping",
                TimelineMarker::Late { .. } => "late",
                TimelineMarker::Missed { .. } => "missed",
            })
            .collect()
    }

    #[test]
    fn no_pings_gives_empty_timeline() {
        let m = monitor(None);
        assert!(reconstruct_timeline(&m, &[], t0(), 75).is_empty());
    }

    #[test]
    fn on_schedule_history_has_only_pings() {
        let m = monitor(Some(t0()));
        let pings = vec![
            ping(&m, t0(), true),
            ping(&m, t0() - Duration::minutes(10), false),
            ping(&m, t0() - Duration::minutes(20), true),
        ];

        let out = reconstruct_timeline(&m, &pings, t0() + Duration::minutes(3), 75);
        assert_eq!(kinds(&out), vec!["ping", "ping", "ping"]);
        assert!(matches!(out[1], TimelineMarker::Ping { success: false, .. }));
    }

    #[test]
    fn late_marker_leads_inside_grace() {
        let m = monitor(Some(t0()));
        let pings = vec![ping(&m, t0(), true)];

        let out = reconstruct_timeline(&m, &pings, t0() + Duration::minutes(12), 75);
        assert_eq!(kinds(&out), vec!["late", "ping"]);
        assert_eq!(out[0].at(), t0() + Duration::minutes(10));
    }

    #[test]
    fn leading_missed_uses_floor_of_gap_minus_grace() {
        let m = monitor(Some(t0()));
        let pings = vec![ping(&m, t0(), true)];

        // gap 37m: floor((37 - 5) / 10) = 3
        let out = reconstruct_timeline(&m, &pings, t0() + Duration::minutes(37), 75);
        assert_eq!(kinds(&out), vec!["missed", "missed", "missed", "ping"]);
        assert_eq!(out[0].at(), t0() + Duration::minutes(30));
        assert_eq!(out[2].at(), t0() + Duration::minutes(10));
    }

    #[test]
    fn gap_between_pings_uses_ceil_minus_one() {
        let m = monitor(Some(t0()));
        // 34 minutes apart: ceil(34 / 10) - 1 = 3
        let pings = vec![
            ping(&m, t0(), true),
            ping(&m, t0() - Duration::minutes(34), true),
        ];

        let out = reconstruct_timeline(&m, &pings, t0(), 75);
        assert_eq!(kinds(&out), vec!["ping", "missed", "missed", "missed", "ping"]);

        let older = t0() - Duration::minutes(34);
        assert_eq!(out[1].at(), older + Duration::minutes(30));
        assert_eq!(out[3].at(), older + Duration::minutes(10));
    }

    #[test]
    fn gap_within_interval_plus_grace_is_not_missed() {
        let m = monitor(Some(t0()));
        let pings = vec![
            ping(&m, t0(), true),
            ping(&m, t0() - Duration::minutes(15), true),
        ];

        let out = reconstruct_timeline(&m, &pings, t0(), 75);
        assert_eq!(kinds(&out), vec!["ping", "ping"]);
    }

    #[test]
    fn paused_monitor_has_no_leading_markers() {
        let mut m = monitor(Some(t0()));
        m.paused = true;
        m.paused_at = Some(t0() + Duration::minutes(1));
        let pings = vec![ping(&m, t0(), true)];

        let out = reconstruct_timeline(&m, &pings, t0() + Duration::hours(5), 75);
        assert_eq!(kinds(&out), vec!["ping"]);
    }

    #[test]
    fn output_is_truncated_to_max_len() {
        let m = monitor(Some(t0()));
        let pings = vec![ping(&m, t0(), true)];

        // a year of silence would be tens of thousands of missed cycles
        let out = reconstruct_timeline(&m, &pings, t0() + Duration::days(365), 75);
        assert_eq!(out.len(), 75);
        assert!(out.iter().all(|mk| matches!(mk, TimelineMarker::Missed { .. })));

        let out = reconstruct_timeline(&m, &pings, t0(), 0);
        assert!(out.is_empty());
    }
}
