//! # Feature: Health Checks
//!
//! Samples process resources and the store, combines them with the recent
//! command error rate into a single health report, and keeps a bounded history
//! of past reports.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::clock::Clock;
use crate::config::HealthThresholds;
use crate::database::Store;
use crate::error::{with_timeout, MonitorError};
use crate::event_recorder::EventRecorder;
use crate::metrics_cache::RingBuffer;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::Mutex;

/// Captured when the first health evaluator is built
static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Status of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Warning,
    Critical,
    Slow,
    Error,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Warning => "warning",
            ComponentStatus::Critical => "critical",
            ComponentStatus::Slow => "slow",
            ComponentStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    /// Worst of the component statuses
    pub fn from_components(statuses: &[ComponentStatus]) -> Self {
        if statuses
            .iter()
            .any(|s| matches!(s, ComponentStatus::Critical | ComponentStatus::Error))
        {
            OverallStatus::Unhealthy
        } else if statuses
            .iter()
            .any(|s| matches!(s, ComponentStatus::Warning | ComponentStatus::Slow))
        {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }
}

/// healthy below `warning`, warning below `critical`, critical otherwise
pub fn band_status(value: f64, warning: f64, critical: f64) -> ComponentStatus {
    if value < warning {
        ComponentStatus::Healthy
    } else if value < critical {
        ComponentStatus::Warning
    } else {
        ComponentStatus::Critical
    }
}

/// Raw memory reading for this process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryReading {
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    pub total_bytes: u64,
}

/// Raw CPU reading for this process. Times are cumulative seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuReading {
    pub percent: f64,
    pub user_time: f64,
    pub system_time: f64,
}

/// Source of process resource readings.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait ResourceSampler: Send + Sync {
    fn memory(&self) -> Result<MemoryReading, MonitorError>;
    fn cpu(&self) -> Result<CpuReading, MonitorError>;
}

/// `sysinfo`-backed sampler for the current process
pub struct SysinfoSampler {
    pid: Pid,
    system: StdMutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Result<Self, MonitorError> {
        let pid = sysinfo::get_current_pid().map_err(MonitorError::sampling)?;
        Ok(SysinfoSampler {
            pid,
            system: StdMutex::new(System::new()),
        })
    }

    fn refresh_process(&self, system: &mut System) {
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory().with_cpu(),
        );
    }
}

impl ResourceSampler for SysinfoSampler {
    fn memory(&self) -> Result<MemoryReading, MonitorError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| MonitorError::sampling(format!("sampler lock poisoned: {e}")))?;

        system.refresh_memory();
        self.refresh_process(&mut system);

        let process = system
            .process(self.pid)
            .ok_or_else(|| MonitorError::sampling(format!("process {} not found", self.pid)))?;

        Ok(MemoryReading {
            rss_bytes: process.memory(),
            vms_bytes: process.virtual_memory(),
            total_bytes: system.total_memory(),
        })
    }

    fn cpu(&self) -> Result<CpuReading, MonitorError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| MonitorError::sampling(format!("sampler lock poisoned: {e}")))?;

        // Usage is a delta between two refreshes
        self.refresh_process(&mut system);
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.refresh_process(&mut system);

        let process = system
            .process(self.pid)
            .ok_or_else(|| MonitorError::sampling(format!("process {} not found", self.pid)))?;
        let (user_time, system_time) = cpu_times()?;

        Ok(CpuReading {
            percent: process.cpu_usage() as f64,
            user_time,
            system_time,
        })
    }
}

/// Clock ticks per second used by /proc accounting
#[cfg(target_os = "linux")]
const USER_HZ: f64 = 100.0;

/// Cumulative (user, system) CPU seconds of this process
#[cfg(target_os = "linux")]
fn cpu_times() -> Result<(f64, f64), MonitorError> {
    let stat = std::fs::read_to_string("/proc/self/stat").map_err(MonitorError::sampling)?;
    parse_proc_stat_times(&stat)
}

#[cfg(not(target_os = "linux"))]
fn cpu_times() -> Result<(f64, f64), MonitorError> {
    Ok((0.0, 0.0))
}

/// utime and stime are fields 14 and 15; the command name may contain spaces
#[cfg(target_os = "linux")]
fn parse_proc_stat_times(stat: &str) -> Result<(f64, f64), MonitorError> {
    let after_comm = stat
        .rfind(')')
        .map(|idx| &stat[idx + 1..])
        .ok_or_else(|| MonitorError::sampling("malformed /proc/self/stat"))?;

    // Fields after the command name start at field 3 (state)
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let read = |field: usize| -> Result<f64, MonitorError> {
        fields
            .get(field - 3)
            .and_then(|value| value.parse::<u64>().ok())
            .map(|ticks| ticks as f64 / USER_HZ)
            .ok_or_else(|| MonitorError::sampling(format!("missing field {field} in /proc/self/stat")))
    };

    Ok((read(14)?, read(15)?))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryHealth {
    pub rss_mb: f64,
    pub vms_mb: f64,
    pub percent: f64,
    pub status: ComponentStatus,
    pub error: Option<String>,
}

impl MemoryHealth {
    pub fn from_reading(reading: MemoryReading, thresholds: &HealthThresholds) -> Self {
        let percent = if reading.total_bytes > 0 {
            reading.rss_bytes as f64 / reading.total_bytes as f64 * 100.0
        } else {
            0.0
        };
        MemoryHealth {
            rss_mb: round_to(reading.rss_bytes as f64 / BYTES_PER_MB, 2),
            vms_mb: round_to(reading.vms_bytes as f64 / BYTES_PER_MB, 2),
            percent: round_to(percent, 2),
            status: band_status(percent, thresholds.memory_warning, thresholds.memory_critical),
            error: None,
        }
    }

    pub fn failed(err: &MonitorError) -> Self {
        MemoryHealth {
            rss_mb: 0.0,
            vms_mb: 0.0,
            percent: 0.0,
            status: ComponentStatus::Error,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuHealth {
    pub percent: f64,
    pub user_time: f64,
    pub system_time: f64,
    pub status: ComponentStatus,
    pub error: Option<String>,
}

impl CpuHealth {
    pub fn from_reading(reading: CpuReading, thresholds: &HealthThresholds) -> Self {
        CpuHealth {
            percent: round_to(reading.percent, 2),
            user_time: round_to(reading.user_time, 2),
            system_time: round_to(reading.system_time, 2),
            status: band_status(reading.percent, thresholds.cpu_warning, thresholds.cpu_critical),
            error: None,
        }
    }

    pub fn failed(err: &MonitorError) -> Self {
        CpuHealth {
            percent: 0.0,
            user_time: 0.0,
            system_time: 0.0,
            status: ComponentStatus::Error,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    /// Seconds
    pub response_time: f64,
    pub guild_count: i64,
    pub database_size_mb: f64,
    pub status: ComponentStatus,
    pub error: Option<String>,
}

impl DatabaseHealth {
    pub fn failed(err: &MonitorError) -> Self {
        DatabaseHealth {
            connected: false,
            response_time: 0.0,
            guild_count: 0,
            database_size_mb: 0.0,
            status: ComponentStatus::Error,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRateHealth {
    pub total_commands: i64,
    pub failed_commands: i64,
    /// Percent of commands that failed in the last hour
    pub error_rate: f64,
    pub status: ComponentStatus,
    pub error: Option<String>,
}

impl ErrorRateHealth {
    pub fn from_counts(total: i64, failed: i64, thresholds: &HealthThresholds) -> Self {
        let rate = if total > 0 {
            failed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        ErrorRateHealth {
            total_commands: total,
            failed_commands: failed,
            error_rate: round_to(rate, 2),
            status: band_status(rate, thresholds.error_rate_warning, thresholds.error_rate_critical),
            error: None,
        }
    }

    pub fn failed(err: &MonitorError) -> Self {
        ErrorRateHealth {
            total_commands: 0,
            failed_commands: 0,
            error_rate: 0.0,
            status: ComponentStatus::Error,
            error: Some(err.to_string()),
        }
    }
}

/// Full health report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub uptime_seconds: f64,
    pub memory: MemoryHealth,
    pub cpu: CpuHealth,
    pub database: DatabaseHealth,
    pub error_rate: ErrorRateHealth,
}

/// Condensed report kept in history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub memory_rss_mb: f64,
    pub memory_vms_mb: f64,
    pub memory_percent: f64,
    pub cpu_percent: f64,
    pub cpu_user_time: f64,
    pub cpu_system_time: f64,
    pub database_connected: bool,
    pub database_response_time: f64,
    pub database_size_mb: f64,
    pub error_rate: f64,
}

impl From<&HealthReport> for HealthSample {
    fn from(report: &HealthReport) -> Self {
        HealthSample {
            timestamp: report.timestamp,
            overall_status: report.overall_status,
            memory_rss_mb: report.memory.rss_mb,
            memory_vms_mb: report.memory.vms_mb,
            memory_percent: report.memory.percent,
            cpu_percent: report.cpu.percent,
            cpu_user_time: report.cpu.user_time,
            cpu_system_time: report.cpu.system_time,
            database_connected: report.database.connected,
            database_response_time: report.database.response_time,
            database_size_mb: report.database.database_size_mb,
            error_rate: report.error_rate.error_rate,
        }
    }
}

/// Evaluates component health and keeps recent samples
#[derive(Clone)]
pub struct HealthEvaluator {
    store: Arc<dyn Store>,
    recorder: EventRecorder,
    sampler: Arc<dyn ResourceSampler>,
    clock: Arc<dyn Clock>,
    thresholds: HealthThresholds,
    timeout: Duration,
    history: Arc<Mutex<RingBuffer<HealthSample>>>,
}

impl HealthEvaluator {
    pub fn new(
        store: Arc<dyn Store>,
        recorder: EventRecorder,
        sampler: Arc<dyn ResourceSampler>,
        thresholds: HealthThresholds,
        history_capacity: usize,
    ) -> Result<Self, MonitorError> {
        thresholds.validate()?;
        let history = RingBuffer::new(history_capacity)?;
        Lazy::force(&PROCESS_START);

        info!("HealthEvaluator initialized");
        Ok(HealthEvaluator {
            store,
            clock: recorder.clock().clone(),
            timeout: recorder.timeout(),
            recorder,
            sampler,
            thresholds,
            history: Arc::new(Mutex::new(history)),
        })
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Seconds since the first health evaluator was built
    pub fn uptime_seconds(&self) -> f64 {
        PROCESS_START.elapsed().as_secs_f64()
    }

    pub async fn memory(&self) -> MemoryHealth {
        let sampler = self.sampler.clone();
        let reading = with_timeout("check_memory", self.timeout, async move {
            tokio::task::spawn_blocking(move || sampler.memory())
                .await
                .map_err(MonitorError::sampling)?
        })
        .await;

        match reading {
            Ok(reading) => MemoryHealth::from_reading(reading, &self.thresholds),
            Err(e) => {
                warn!("Memory check failed: {e}");
                MemoryHealth::failed(&e)
            }
        }
    }

    pub async fn cpu(&self) -> CpuHealth {
        let sampler = self.sampler.clone();
        let reading = with_timeout("check_cpu", self.timeout, async move {
            tokio::task::spawn_blocking(move || sampler.cpu())
                .await
                .map_err(MonitorError::sampling)?
        })
        .await;

        match reading {
            Ok(reading) => CpuHealth::from_reading(reading, &self.thresholds),
            Err(e) => {
                warn!("CPU check failed: {e}");
                CpuHealth::failed(&e)
            }
        }
    }

    /// Connectivity and status come from the ping alone. Size and guild count
    /// failures leave those fields at zero and are reported in `error`.
    pub async fn database(&self) -> DatabaseHealth {
        let latency = match with_timeout("check_database", self.timeout, self.store.ping()).await {
            Ok(latency) => latency,
            Err(e) => {
                warn!("Database check failed: {e}");
                return DatabaseHealth::failed(&e);
            }
        };

        let response_time = latency.as_secs_f64();
        let status = if response_time > self.thresholds.database_slow_secs {
            ComponentStatus::Slow
        } else {
            ComponentStatus::Healthy
        };

        let mut problems = Vec::new();
        let size = match with_timeout("database_size", self.timeout, self.store.size()).await {
            Ok(size) => size,
            Err(e) => {
                problems.push(e.to_string());
                0
            }
        };
        let guild_count = match with_timeout("guild_count", self.timeout, self.store.guild_count()).await {
            Ok(count) => count,
            Err(e) => {
                problems.push(e.to_string());
                0
            }
        };
        if !problems.is_empty() {
            warn!("Database checks incomplete: {}", problems.join("; "));
        }

        DatabaseHealth {
            connected: true,
            response_time: round_to(response_time, 4),
            guild_count,
            database_size_mb: round_to(size as f64 / BYTES_PER_MB, 2),
            status,
            error: if problems.is_empty() { None } else { Some(problems.join("; ")) },
        }
    }

    /// Failed share of commands over the last hour; `None` covers every guild
    pub async fn error_rate(&self, guild_id: Option<&str>) -> ErrorRateHealth {
        let counts = with_timeout("check_error_rate", self.timeout, async {
            let events = self.recorder.events_since(guild_id, ChronoDuration::hours(1)).await?;
            let failed = events.iter().filter(|e| !e.success).count() as i64;
            Ok((events.len() as i64, failed))
        })
        .await;

        match counts {
            Ok((total, failed)) => ErrorRateHealth::from_counts(total, failed, &self.thresholds),
            Err(e) => {
                warn!("Error rate check failed: {e}");
                ErrorRateHealth::failed(&e)
            }
        }
    }

    /// Run every check, derive the overall status and append to history
    pub async fn report(&self, guild_id: Option<&str>) -> HealthReport {
        let (memory, cpu, database, error_rate) =
            futures::join!(self.memory(), self.cpu(), self.database(), self.error_rate(guild_id));

        let overall_status =
            OverallStatus::from_components(&[memory.status, cpu.status, database.status, error_rate.status]);

        let report = HealthReport {
            timestamp: self.clock.now(),
            overall_status,
            uptime_seconds: round_to(self.uptime_seconds(), 2),
            memory,
            cpu,
            database,
            error_rate,
        };

        self.history.lock().await.push(HealthSample::from(&report));
        debug!(
            "Health report: {} (memory={}, cpu={}, database={}, error_rate={})",
            report.overall_status.as_str(),
            report.memory.status.as_str(),
            report.cpu.status.as_str(),
            report.database.status.as_str(),
            report.error_rate.status.as_str()
        );

        report
    }

    /// Recorded samples, oldest first
    pub async fn history(&self) -> Vec<HealthSample> {
        self.history.lock().await.snapshot()
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::database::Database;
    use crate::models::CommandEvent;

    struct FixedSampler {
        memory: MemoryReading,
        cpu_percent: f64,
    }

    impl ResourceSampler for FixedSampler {
        fn memory(&self) -> Result<MemoryReading, MonitorError> {
            Ok(self.memory)
        }

        fn cpu(&self) -> Result<CpuReading, MonitorError> {
            Ok(CpuReading {
                percent: self.cpu_percent,
                user_time: 1.5,
                system_time: 0.25,
            })
        }
    }

    fn sampler(memory_percent: u64, cpu_percent: f64) -> Arc<dyn ResourceSampler> {
        Arc::new(FixedSampler {
            memory: MemoryReading {
                rss_bytes: memory_percent * 1024 * 1024,
                vms_bytes: 200 * 1024 * 1024,
                total_bytes: 100 * 1024 * 1024,
            },
            cpu_percent,
        })
    }

    async fn build_evaluator(sampler: Arc<dyn ResourceSampler>, capacity: usize) -> (HealthEvaluator, EventRecorder) {
        let store: Arc<dyn Store> = Arc::new(Database::new(":memory:").await.unwrap());
        let recorder = EventRecorder::new(store.clone(), Arc::new(SystemClock), Duration::from_secs(5)).unwrap();
        let evaluator =
            HealthEvaluator::new(store, recorder.clone(), sampler, HealthThresholds::default(), capacity).unwrap();
        (evaluator, recorder)
    }

    #[test]
    fn test_band_status_edges() {
        assert_eq!(band_status(69.9, 70.0, 85.0), ComponentStatus::Healthy);
        assert_eq!(band_status(70.0, 70.0, 85.0), ComponentStatus::Warning);
        assert_eq!(band_status(84.9, 70.0, 85.0), ComponentStatus::Warning);
        assert_eq!(band_status(85.0, 70.0, 85.0), ComponentStatus::Critical);
    }

    #[test]
    fn test_overall_status_is_worst_of() {
        use ComponentStatus::*;
        assert_eq!(OverallStatus::from_components(&[Healthy, Healthy]), OverallStatus::Healthy);
        assert_eq!(OverallStatus::from_components(&[Healthy, Slow]), OverallStatus::Degraded);
        assert_eq!(OverallStatus::from_components(&[Warning, Healthy]), OverallStatus::Degraded);
        assert_eq!(OverallStatus::from_components(&[Warning, Error]), OverallStatus::Unhealthy);
        assert_eq!(OverallStatus::from_components(&[Critical, Slow]), OverallStatus::Unhealthy);
    }

    #[test]
    fn test_error_rate_bands() {
        let thresholds = HealthThresholds::default();
        assert_eq!(ErrorRateHealth::from_counts(0, 0, &thresholds).status, ComponentStatus::Healthy);
        assert_eq!(ErrorRateHealth::from_counts(100, 4, &thresholds).status, ComponentStatus::Healthy);
        assert_eq!(ErrorRateHealth::from_counts(100, 10, &thresholds).status, ComponentStatus::Warning);
        let critical = ErrorRateHealth::from_counts(10, 2, &thresholds);
        assert_eq!(critical.status, ComponentStatus::Critical);
        assert_eq!(critical.error_rate, 20.0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OverallStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
        let json = serde_json::to_string(&ComponentStatus::Slow).unwrap();
        assert_eq!(json, "\"slow\"");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_proc_stat_handles_spaces_in_name() {
        let stat = "1234 (bot (worker) 1) S 1 1234 1234 0 -1 4194560 100 0 0 0 250 75 0 0 20 0 8 0 100 0 0";
        let (user, system) = parse_proc_stat_times(stat).unwrap();
        assert_eq!(user, 2.5);
        assert_eq!(system, 0.75);
    }

    #[tokio::test]
    async fn test_report_healthy() {
        let (evaluator, _) = build_evaluator(sampler(40, 10.0), 10).await;
        let report = evaluator.report(None).await;

        assert_eq!(report.memory.status, ComponentStatus::Healthy);
        assert_eq!(report.memory.percent, 40.0);
        assert_eq!(report.cpu.user_time, 1.5);
        assert!(report.database.connected);
        assert_eq!(report.database.status, ComponentStatus::Healthy);
        assert_eq!(report.overall_status, OverallStatus::Healthy);
        assert!(report.uptime_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_report_degrades_on_warning_and_critical() {
        let (evaluator, _) = build_evaluator(sampler(75, 10.0), 10).await;
        assert_eq!(evaluator.report(None).await.overall_status, OverallStatus::Degraded);

        let (evaluator, _) = build_evaluator(sampler(10, 95.0), 10).await;
        let report = evaluator.report(None).await;
        assert_eq!(report.cpu.status, ComponentStatus::Critical);
        assert_eq!(report.overall_status, OverallStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_error_rate_counts_failed_commands_in_guild() {
        let (evaluator, recorder) = build_evaluator(sampler(10, 1.0), 10).await;
        for i in 0..4 {
            let event = CommandEvent::new("G1", "U1", "play");
            let event = if i == 0 { event.failed("timeout") } else { event };
            assert!(recorder.log(event).await);
        }
        recorder.log(CommandEvent::new("G2", "U1", "play").failed("boom")).await;

        let guild = evaluator.error_rate(Some("G1")).await;
        assert_eq!(guild.total_commands, 4);
        assert_eq!(guild.error_rate, 25.0);
        assert_eq!(guild.status, ComponentStatus::Critical);

        let all = evaluator.error_rate(None).await;
        assert_eq!(all.total_commands, 5);
        assert_eq!(all.failed_commands, 2);
    }

    #[tokio::test]
    async fn test_uptime_counts_from_evaluator_construction() {
        let (evaluator, _) = build_evaluator(sampler(10, 1.0), 10).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(evaluator.uptime_seconds() >= 0.02);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let (evaluator, _) = build_evaluator(sampler(10, 1.0), 3).await;
        for _ in 0..5 {
            evaluator.report(None).await;
        }
        let history = evaluator.history().await;
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[tokio::test]
    async fn test_zero_history_capacity_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(Database::new(":memory:").await.unwrap());
        let recorder = EventRecorder::new(store.clone(), Arc::new(SystemClock), Duration::from_secs(5)).unwrap();
        let result = HealthEvaluator::new(store, recorder, sampler(1, 1.0), HealthThresholds::default(), 0);
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }
}
