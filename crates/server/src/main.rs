use cronbeat::api;
use cronbeat::config::{self, StorageBackend};
use cronbeat::db;

use cronbeat::monitors::pause::run_pause_sweeper;
use cronbeat::monitors::{
    Clock, InMemoryRateCounters, MemoryMonitorStore, MonitorStore, MonitorsRepo, PauseController,
    PgRateCounters, PingRateLimiter, SystemClock,
};
use cronbeat::monitors::rate_limit::{run_counter_pruner, RateCounterStore};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = config::Config::from_env()?;

    tracing::info!(
        storage = ?cfg.storage,
        addr = %cfg.listen_addr,
        migrate_on_startup = cfg.migrate_on_startup,
        sweep_interval_secs = cfg.sweep_interval_secs,
        ping_limit = cfg.ping_limit_per_window,
        ping_window_secs = cfg.ping_window_secs,
        timeline_limit = cfg.timeline_limit,
        "cronbeat starting"
    );

    let (store, counters): (Arc<dyn MonitorStore>, Arc<dyn RateCounterStore>) = match cfg.storage {
        StorageBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is missing"))?;
            let pool = db::make_pool(url).await?;
            if cfg.migrate_on_startup {
                db::run_migrations(&pool).await?;
                tracing::info!("migrations applied");
            }
            let store: Arc<dyn MonitorStore> = Arc::new(MonitorsRepo::new(pool.clone()));
            let counters: Arc<dyn RateCounterStore> = Arc::new(PgRateCounters::new(pool));
            (store, counters)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; monitors are lost on restart");
            let store: Arc<dyn MonitorStore> = Arc::new(MemoryMonitorStore::new());
            let counters: Arc<dyn RateCounterStore> = Arc::new(InMemoryRateCounters::new());
            (store, counters)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rate_limiter = PingRateLimiter::new(
        counters,
        cfg.ping_limit_per_window,
        chrono::Duration::seconds(cfg.ping_window_secs),
    );

    // ---- API task ----
    let api_state = api::ApiState::new(
        store.clone(),
        clock.clone(),
        rate_limiter.clone(),
        cfg.timeline_limit,
    );
    let app = api::router(api_state);
    let addr = cfg.listen_addr.clone();

    let api_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("api listening on http://{addr}");
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok::<(), anyhow::Error>(())
    });

    // ---- Pause sweep task ----
    let sweep_handle = {
        let controller = PauseController::new(store.clone(), clock.clone());
        let every = Duration::from_secs(cfg.sweep_interval_secs);
        tokio::spawn(async move {
            run_pause_sweeper(controller, every).await;
            Ok::<(), anyhow::Error>(())
        })
    };

    // ---- Rate counter cleanup ----
    let prune_handle = {
        let limiter = rate_limiter.clone();
        let clock = clock.clone();
        tokio::spawn(async move {
            run_counter_pruner(limiter, clock).await;
            Ok::<(), anyhow::Error>(())
        })
    };

    tokio::select! {
        res = api_handle => res??,
        res = sweep_handle => res??,
        res = prune_handle => res??,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
