// crates/cronbeat/src/monitors/repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::monitors::model::{Monitor, MonitorPatch, NewMonitor, Ping};
use crate::monitors::store::MonitorStore;

const MONITOR_COLUMNS: &str = r#"
    id, name, schedule, interval_minutes, grace_minutes, last_ping,
    paused, paused_at, paused_until, pause_reason,
    created_at
"#;

const PING_COLUMNS: &str = r#"
    id, monitor_id, "timestamp", status, duration_ms, message, ip
"#;

/// Postgres-backed monitor store.
#[derive(Clone)]
pub struct MonitorsRepo {
    pool: PgPool,
}

impl MonitorsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MonitorStore for MonitorsRepo {
    // ----------------------------
    // Monitor CRUD
    // ----------------------------

    async fn create_monitor(&self, new: NewMonitor, now: DateTime<Utc>) -> anyhow::Result<Monitor> {
        let m = new.into_monitor(Uuid::new_v4(), now);

        let monitor = sqlx::query_as::<_, Monitor>(&format!(
            r#"
            INSERT INTO monitors (id, name, schedule, interval_minutes, grace_minutes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MONITOR_COLUMNS}
            "#
        ))
        .bind(m.id)
        .bind(&m.name)
        .bind(&m.schedule)
        .bind(m.interval_minutes)
        .bind(m.grace_minutes)
        .bind(m.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(monitor)
    }

    async fn get_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>> {
        let monitor = sqlx::query_as::<_, Monitor>(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(monitor)
    }

    async fn list_monitors(&self) -> anyhow::Result<Vec<Monitor>> {
        let rows = sqlx::query_as::<_, Monitor>(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_monitor(
        &self,
        id: Uuid,
        patch: MonitorPatch,
    ) -> anyhow::Result<Option<Monitor>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Monitor>(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut monitor) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        // apply in Rust so the schedule -> interval derivation lives in one place
        patch.apply(&mut monitor);

        let updated = sqlx::query_as::<_, Monitor>(&format!(
            r#"
            UPDATE monitors
            SET name = $2,
                schedule = $3,
                interval_minutes = $4,
                grace_minutes = $5
            WHERE id = $1
            RETURNING {MONITOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&monitor.name)
        .bind(&monitor.schedule)
        .bind(monitor.interval_minutes)
        .bind(monitor.grace_minutes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_monitor(&self, id: Uuid) -> anyhow::Result<bool> {
        // pings go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM monitors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // ----------------------------
    // Pings
    // ----------------------------

    async fn record_ping(&self, ping: Ping) -> anyhow::Result<Option<Ping>> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r#"
            UPDATE monitors
            SET last_ping = $2
            WHERE id = $1
            "#,
        )
        .bind(ping.monitor_id)
        .bind(ping.timestamp)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if touched == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // if this insert fails the transaction is dropped and the
        // last_ping update above rolls back with it
        let stored = sqlx::query_as::<_, Ping>(&format!(
            r#"
            INSERT INTO pings (id, monitor_id, "timestamp", status, duration_ms, message, ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PING_COLUMNS}
            "#
        ))
        .bind(ping.id)
        .bind(ping.monitor_id)
        .bind(ping.timestamp)
        .bind(&ping.status)
        .bind(ping.duration_ms)
        .bind(&ping.message)
        .bind(&ping.ip)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn recent_pings(&self, monitor_id: Uuid, limit: i64) -> anyhow::Result<Vec<Ping>> {
        let rows = sqlx::query_as::<_, Ping>(&format!(
            r#"
            SELECT {PING_COLUMNS}
            FROM pings
            WHERE monitor_id = $1
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(monitor_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_pings(&self) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pings")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    // ----------------------------
    // Pause state
    // ----------------------------

    async fn pause_monitor(
        &self,
        id: Uuid,
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Monitor>> {
        let monitor = sqlx::query_as::<_, Monitor>(&format!(
            r#"
            UPDATE monitors
            SET paused = TRUE,
                paused_at = $4,
                pause_reason = $2,
                paused_until = $3
            WHERE id = $1
            RETURNING {MONITOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(reason)
        .bind(until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(monitor)
    }

    async fn resume_monitor(&self, id: Uuid) -> anyhow::Result<Option<Monitor>> {
        let monitor = sqlx::query_as::<_, Monitor>(&format!(
            r#"
            UPDATE monitors
            SET paused = FALSE,
                paused_at = NULL,
                paused_until = NULL,
                pause_reason = NULL
            WHERE id = $1
            RETURNING {MONITOR_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(monitor)
    }

    /// One statement: each row is cleared as a whole, and a row re-paused
    /// with a later `paused_until` while we wait on its lock is re-checked
    /// and skipped.
    async fn resume_expired(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE monitors
            SET paused = FALSE,
                paused_at = NULL,
                paused_until = NULL,
                pause_reason = NULL
            WHERE paused
              AND paused_until IS NOT NULL
              AND paused_until <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
