pub mod clock;
pub mod memory;
pub mod model;
pub mod pause;
pub mod rate_limit;
pub mod recorder;
pub mod repo;
pub mod schedule;
pub mod stats;
pub mod status;
pub mod store;
pub mod timeline;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryMonitorStore;
pub use model::{Monitor, MonitorPatch, NewMonitor, NewPing, Ping, PingStatus};
pub use pause::PauseController;
pub use rate_limit::{InMemoryRateCounters, PgRateCounters, PingRateLimiter, RateDecision};
pub use recorder::PingRecorder;
pub use repo::MonitorsRepo;
pub use schedule::{parse_schedule, try_parse_schedule};
pub use stats::MonitorStats;
pub use status::{compute_status, MonitorStatus};
pub use store::MonitorStore;
pub use timeline::{build_timeline, MonitorTimeline, TimelineMarker};
