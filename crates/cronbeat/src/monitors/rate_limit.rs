// Per-monitor throttle for ping ingestion: a fixed number of hits per window,
// where the window opens on the first hit and closes `window` later.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::monitors::clock::Clock;

pub const DEFAULT_PINGS_PER_WINDOW: i64 = 5;
pub const DEFAULT_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: i64 },
    Limited { retry_after_secs: i64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Where window counters live. `hit` must count atomically: two concurrent
/// hits on the same key never read the same count.
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Counts one hit and returns `(hits in current window, window start)`.
    async fn hit(
        &self,
        key: Uuid,
        now: DateTime<Utc>,
        window: Duration,
    ) -> anyhow::Result<(i64, DateTime<Utc>)>;

    /// Drops counters whose window closed before `now`.
    async fn prune(&self, now: DateTime<Utc>, window: Duration) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PingRateLimiter {
    counters: Arc<dyn RateCounterStore>,
    max_per_window: i64,
    window: Duration,
}

impl PingRateLimiter {
    pub fn new(counters: Arc<dyn RateCounterStore>, max_per_window: i64, window: Duration) -> Self {
        Self {
            counters,
            max_per_window,
            window,
        }
    }

    /// 5 per 60 seconds, counted in memory.
    pub fn in_memory_default() -> Self {
        Self::new(
            Arc::new(InMemoryRateCounters::new()),
            DEFAULT_PINGS_PER_WINDOW,
            Duration::seconds(DEFAULT_WINDOW_SECS),
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn check(&self, monitor_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<RateDecision> {
        let (count, window_start) = self.counters.hit(monitor_id, now, self.window).await?;

        if count > self.max_per_window {
            let reset_at = window_start + self.window;
            let ms = (reset_at - now).num_milliseconds().max(0);
            // round up, and never tell a client to retry in 0 seconds
            let retry_after_secs = ((ms + 999) / 1000).max(1);
            tracing::debug!(monitor_id = %monitor_id, count, retry_after_secs, "ping rate limited");
            return Ok(RateDecision::Limited { retry_after_secs });
        }

        Ok(RateDecision::Allowed {
            remaining: self.max_per_window - count,
        })
    }

    pub async fn prune(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.counters.prune(now, self.window).await
    }
}

/// Drops closed windows once per window length until the task is dropped.
pub async fn run_counter_pruner(limiter: PingRateLimiter, clock: Arc<dyn Clock>) {
    let every = limiter
        .window()
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(DEFAULT_WINDOW_SECS as u64));
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match limiter.prune(clock.now()).await {
            Ok(n) if n > 0 => tracing::debug!(pruned = n, "rate counters pruned"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "rate counter prune failed"),
        }
    }
}

/// Counters in a `DashMap`; the entry guard holds the shard lock for the
/// whole read-modify-write.
#[derive(Default)]
pub struct InMemoryRateCounters {
    windows: DashMap<Uuid, (DateTime<Utc>, i64)>,
}

impl InMemoryRateCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCounterStore for InMemoryRateCounters {
    async fn hit(
        &self,
        key: Uuid,
        now: DateTime<Utc>,
        window: Duration,
    ) -> anyhow::Result<(i64, DateTime<Utc>)> {
        let mut entry = self.windows.entry(key).or_insert((now, 0));
        let (start, count) = entry.value_mut();
        if now - *start >= window {
            *start = now;
            *count = 0;
        }
        *count += 1;
        Ok((*count, *start))
    }

    async fn prune(&self, now: DateTime<Utc>, window: Duration) -> anyhow::Result<u64> {
        let before = self.windows.len();
        self.windows.retain(|_, (start, _)| now - *start < window);
        Ok(before.saturating_sub(self.windows.len()) as u64)
    }
}

/// Counters in the `ping_rate_counters` table, shared by every process
/// pointing at the same database.
#[derive(Clone)]
pub struct PgRateCounters {
    pool: PgPool,
}

impl PgRateCounters {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn window_secs(window: Duration) -> f64 {
    window.num_milliseconds() as f64 / 1000.0
}

#[async_trait]
impl RateCounterStore for PgRateCounters {
    async fn hit(
        &self,
        key: Uuid,
        now: DateTime<Utc>,
        window: Duration,
    ) -> anyhow::Result<(i64, DateTime<Utc>)> {
        // SET expressions all see the pre-update row, so both CASEs agree
        let row: (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO ping_rate_counters (monitor_id, window_start, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (monitor_id) DO UPDATE
            SET window_start = CASE
                    WHEN ping_rate_counters.window_start + ($3::float8 * interval '1 second') <= EXCLUDED.window_start
                    THEN EXCLUDED.window_start
                    ELSE ping_rate_counters.window_start
                END,
                count = CASE
                    WHEN ping_rate_counters.window_start + ($3::float8 * interval '1 second') <= EXCLUDED.window_start
                    THEN 1
                    ELSE ping_rate_counters.count + 1
                END
            RETURNING count, window_start
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(window_secs(window))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn prune(&self, now: DateTime<Utc>, window: Duration) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM ping_rate_counters
            WHERE window_start + ($2::float8 * interval '1 second') <= $1
            "#,
        )
        .bind(now)
        .bind(window_secs(window))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn sixth_ping_in_window_is_rejected() {
        let limiter = PingRateLimiter::in_memory_default();
        let id = Uuid::new_v4();

        for i in 0..5 {
            let d = limiter
                .check(id, t0() + Duration::seconds(i * 5))
                .await
                .unwrap();
            assert_eq!(d, RateDecision::Allowed { remaining: 4 - i });
        }

        let d = limiter.check(id, t0() + Duration::seconds(45)).await.unwrap();
        assert_eq!(d, RateDecision::Limited { retry_after_secs: 15 });
    }

    #[tokio::test]
    async fn window_resets_sixty_seconds_after_first_hit() {
        let limiter = PingRateLimiter::in_memory_default();
        let id = Uuid::new_v4();

        for _ in 0..6 {
            limiter.check(id, t0()).await.unwrap();
        }
        let d = limiter.check(id, t0() + Duration::milliseconds(59_500)).await.unwrap();
        assert_eq!(d, RateDecision::Limited { retry_after_secs: 1 });

        let d = limiter.check(id, t0() + Duration::seconds(60)).await.unwrap();
        assert_eq!(d, RateDecision::Allowed { remaining: 4 });
    }

    #[tokio::test]
    async fn monitors_are_counted_separately() {
        let limiter = PingRateLimiter::in_memory_default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        for _ in 0..5 {
            assert!(limiter.check(a, t0()).await.unwrap().is_allowed());
        }
        assert!(!limiter.check(a, t0()).await.unwrap().is_allowed());
        assert!(limiter.check(b, t0()).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn limiters_do_not_share_state() {
        let first = PingRateLimiter::in_memory_default();
        let second = PingRateLimiter::in_memory_default();
        let id = Uuid::new_v4();

        for _ in 0..6 {
            first.check(id, t0()).await.unwrap();
        }
        assert!(second.check(id, t0()).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn concurrent_hits_are_all_counted() {
        let counters = Arc::new(InMemoryRateCounters::new());
        let limiter = PingRateLimiter::new(counters, 5, Duration::seconds(60));
        let id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.check(id, t0()).await }));
        }

        let mut allowed = 0;
        for h in handles {
            if h.await.unwrap().unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn prune_drops_closed_windows() {
        let counters = InMemoryRateCounters::new();
        let window = Duration::seconds(60);
        counters.hit(Uuid::new_v4(), t0(), window).await.unwrap();
        counters
            .hit(Uuid::new_v4(), t0() + Duration::seconds(30), window)
            .await
            .unwrap();

        let dropped = counters.prune(t0() + Duration::seconds(61), window).await.unwrap();
        assert_eq!(dropped, 1);
    }
}
