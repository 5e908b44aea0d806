use chrono::Duration;
use cronbeat::monitors::timeline::{build_timeline, TimelineMarker, DEFAULT_TIMELINE_LIMIT};
use cronbeat::monitors::{
    compute_status, stats, Clock, ManualClock, MemoryMonitorStore, MonitorStore, MonitorsRepo,
    NewMonitor, NewPing, PauseController, PingRecorder, SystemClock,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::sync::Arc;
use uuid::Uuid;

const USAGE: &str = "cronbeatctl <command>\n\
     Commands:\n\
     - reset\n\
     - seed <n>\n\
     - status <monitor_id>\n\
     - timeline <monitor_id>\n\
     - sweep\n\
     - stats\n\
     - demo            (in-memory, no database needed)\n\
     \n\
     Uses DATABASE_URL or TEST_DATABASE_URL.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let Some(command) = args.get(1) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if command == "demo" {
        return demo().await;
    }

    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    let store: Arc<dyn MonitorStore> = Arc::new(MonitorsRepo::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command.as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
            seed(store.as_ref(), clock.as_ref(), n).await?;
        }
        "status" => {
            let id = monitor_id_arg(&args)?;
            match store.get_monitor(id).await? {
                Some(m) => println!(
                    "{} {:<24} {:<8} schedule={:?} interval={}m grace={}m last_ping={:?}",
                    m.id,
                    m.name,
                    compute_status(&m, clock.now()),
                    m.schedule,
                    m.effective_interval_minutes(),
                    m.grace_minutes,
                    m.last_ping
                ),
                None => println!("monitor {id} not found"),
            }
        }
        "timeline" => {
            let id = monitor_id_arg(&args)?;
            print_timeline(store.as_ref(), clock.as_ref(), id).await?;
        }
        "sweep" => {
            let resumed = PauseController::new(store.clone(), clock.clone())
                .sweep_now()
                .await?;
            println!("resumed {} monitor(s)", resumed.len());
            for id in resumed {
                println!("  {id}");
            }
        }
        "stats" => {
            let s = stats::snapshot(store.as_ref(), clock.now()).await?;
            println!("{}", serde_json::to_string_pretty(&s)?);
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn monitor_id_arg(args: &[String]) -> anyhow::Result<Uuid> {
    let raw = args
        .get(2)
        .ok_or_else(|| anyhow::anyhow!("usage: cronbeatctl <command> <monitor_id>"))?;
    Ok(raw.parse()?)
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            pings,
            ping_rate_counters,
            monitors
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(pool)
    .await?;

    println!("reset OK");
    Ok(())
}

async fn seed(store: &dyn MonitorStore, clock: &dyn Clock, n: usize) -> anyhow::Result<()> {
    const SCHEDULES: [&str; 4] = ["every 5 minutes", "every hour", "daily", "weekly"];

    for i in 0..n {
        let schedule = SCHEDULES[i % SCHEDULES.len()];
        let m = store
            .create_monitor(NewMonitor::new(format!("demo-{i}"), schedule), clock.now())
            .await?;
        println!("+ monitor {} id={} schedule={schedule:?}", m.name, m.id);
    }
    Ok(())
}

async fn print_timeline(store: &dyn MonitorStore, clock: &dyn Clock, id: Uuid) -> anyhow::Result<()> {
    let Some(tl) = build_timeline(store, id, clock.now(), DEFAULT_TIMELINE_LIMIT).await? else {
        println!("monitor {id} not found");
        return Ok(());
    };

    println!("MONITOR: id={} status={}", tl.monitor_id, tl.status);
    for marker in &tl.markers {
        match marker {
            TimelineMarker::Ping {
                at,
                success,
                duration_ms,
                message,
                ..
            } => println!(
                "{} | ping   | {} duration_ms={:?} message={:?}",
                at.to_rfc3339(),
                if *success { "success" } else { "failure" },
                duration_ms,
                message
            ),
            TimelineMarker::Late { at } => println!("{} | late   |", at.to_rfc3339()),
            TimelineMarker::Missed { at } => println!("{} | missed |", at.to_rfc3339()),
        }
    }
    Ok(())
}

/// Walks one monitor through its states on a manual clock.
async fn demo() -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let store: Arc<dyn MonitorStore> = Arc::new(MemoryMonitorStore::new());
    let recorder = PingRecorder::new(store.clone(), clock.clone());

    let m = store
        .create_monitor(
            NewMonitor::new("nightly-backup", "Every 5 minutes").with_grace(10),
            clock.now(),
        )
        .await?;
    println!("created {} interval={:?}m", m.id, m.interval_minutes);

    let show = |label: &str, m: &cronbeat::monitors::Monitor| {
        println!("{label:<28} -> {}", compute_status(m, clock.now()));
    };

    show("no ping yet", &m);

    recorder.record_ping(m.id, NewPing::default()).await?;
    let m = store
        .get_monitor(m.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("monitor vanished"))?;
    show("just pinged", &m);

    clock.advance(Duration::minutes(6));
    show("6 minutes later", &m);

    clock.advance(Duration::minutes(10));
    show("16 minutes later", &m);

    print_timeline(store.as_ref(), clock.as_ref(), m.id).await?;
    Ok(())
}
