// Shared types and configuration
pub mod clock;
pub mod config;
pub mod error;
pub mod models;

// Storage
pub mod database;

// Monitoring components
pub mod event_recorder;
pub mod health;
pub mod metrics_cache;
pub mod performance;
pub mod usage;

// Wiring
pub mod monitoring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HealthThresholds, MonitoringConfig, PerformanceThresholds};
pub use database::{Database, Store};
pub use error::{safe_execute, with_timeout, MonitorError, Outcome};
pub use models::{CommandEvent, DailyDelta, DailyStat, EventFilter};

pub use event_recorder::{CommandCount, CommandStats, EventRecorder};
pub use health::{
    ComponentStatus, CpuReading, HealthEvaluator, HealthReport, HealthSample, MemoryReading, OverallStatus,
    ResourceSampler, SysinfoSampler,
};
pub use metrics_cache::{CacheSummary, MetricSample, MetricsCache, RingBuffer};
pub use monitoring::{create_monitoring_system, MonitoringSystem};
pub use performance::{Bottleneck, CommandPerformance, PerformanceStats, PerformanceTracker, Severity, TimingGuard, TimingKind};
pub use usage::{ReportPeriod, UsageAggregator, UsageReport};
