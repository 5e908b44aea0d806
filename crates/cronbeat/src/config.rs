// Runtime configuration, loaded once from the environment (and `.env`).

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub listen_addr: String,
    pub migrate_on_startup: bool,
    pub sweep_interval_secs: u64,
    pub ping_limit_per_window: i64,
    pub ping_window_secs: i64,
    pub timeline_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let storage = match env_or_fallback("CRONBEAT_STORAGE", "STORAGE")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            None | Some("postgres") | Some("pg") => StorageBackend::Postgres,
            Some("memory") | Some("mem") => StorageBackend::Memory,
            Some(other) => anyhow::bail!("unknown CRONBEAT_STORAGE: {other}"),
        };

        let database_url = env_or_fallback("CRONBEAT_DATABASE_URL", "DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is missing");
        }

        let listen_addr = env_or_fallback("CRONBEAT_ADDR", "ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let migrate_on_startup = env_bool("CRONBEAT_MIGRATE_ON_STARTUP").unwrap_or(false);

        let sweep_interval_secs = env_or_fallback("CRONBEAT_SWEEP_INTERVAL_SECS", "SWEEP_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30)
            .max(1);

        let ping_limit_per_window = env_or_fallback("CRONBEAT_PING_LIMIT", "PING_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(crate::monitors::rate_limit::DEFAULT_PINGS_PER_WINDOW)
            .max(1);

        let ping_window_secs = env_or_fallback("CRONBEAT_PING_WINDOW_SECS", "PING_WINDOW_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(crate::monitors::rate_limit::DEFAULT_WINDOW_SECS)
            .max(1);

        let timeline_limit = env_or_fallback("CRONBEAT_TIMELINE_LIMIT", "TIMELINE_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(crate::monitors::timeline::DEFAULT_TIMELINE_LIMIT)
            .clamp(1, 500);

        Ok(Self {
            storage,
            database_url,
            listen_addr,
            migrate_on_startup,
            sweep_interval_secs,
            ping_limit_per_window,
            ping_window_secs,
            timeline_limit,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
