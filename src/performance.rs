//! # Feature: Performance Tracking
//!
//! Scoped timing around command execution, slow-command warnings, and
//! bottleneck detection over recorded command events.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Voice-connect and response latencies tracked against their own thresholds
//! - 1.0.0: Initial release with RAII timing guards and non-blocking event forwarding

use crate::config::PerformanceThresholds;
use crate::error::{safe_execute, MonitorError, Outcome};
use crate::event_recorder::EventRecorder;
use crate::metrics_cache::{CacheSummary, MetricsCache};
use crate::models::CommandEvent;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Bottleneck detection looks at this many trailing days
const BOTTLENECK_WINDOW_DAYS: i64 = 7;

/// How many commands `performance_stats` reports
const SLOWEST_COMMANDS_LIMIT: usize = 10;

/// What a timing measured; each kind has its own slowness threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingKind {
    Command,
    VoiceConnect,
    Response,
}

impl TimingKind {
    pub fn as_str(&self) -> &str {
        match self {
            TimingKind::Command => "command",
            TimingKind::VoiceConnect => "voice_connect",
            TimingKind::Response => "response",
        }
    }

    fn threshold(&self, thresholds: &PerformanceThresholds) -> f64 {
        match self {
            TimingKind::Command => thresholds.command_slow,
            TimingKind::VoiceConnect => thresholds.voice_connect_slow,
            TimingKind::Response => thresholds.response_slow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// A command whose average duration is over the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub command: String,
    pub avg_duration: f64,
    pub occurrence_count: i64,
    pub last_occurrence: DateTime<Utc>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPerformance {
    pub command: String,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Slowest average first
    pub slowest_commands: Vec<CommandPerformance>,
    /// Whole-process cache summary; samples are keyed by command name, not guild
    pub cache: CacheSummary,
}

/// Messages for the background forwarder
enum Forward {
    Event(CommandEvent),
    /// Acknowledged once every earlier event has been handed to the recorder
    Flush(oneshot::Sender<()>),
}

struct TrackerInner {
    cache: MetricsCache,
    thresholds: PerformanceThresholds,
    sender: mpsc::UnboundedSender<Forward>,
}

impl TrackerInner {
    fn complete(&self, mut event: CommandEvent, kind: TimingKind, elapsed: f64, outcome: Result<(), String>) {
        self.cache.record(&event.command, elapsed, Utc::now());

        if elapsed > kind.threshold(&self.thresholds) {
            warn!(
                "Slow {} detected: {} took {:.2}s in guild {}",
                kind.as_str(),
                event.command,
                elapsed,
                event.guild_id
            );
        }

        event.duration = elapsed;
        if let Err(message) = outcome {
            event.success = false;
            event.error_message = Some(message);
        }

        if let Err(e) = self.sender.send(Forward::Event(event)) {
            warn!("Failed to queue timed command event: {e}");
        }
    }
}

/// Open timing region. Bookkeeping happens exactly once, when the guard is dropped.
///
/// A guard dropped without `finish` or `fail` records the work as failed:
/// "panicked" while unwinding, "cancelled" otherwise.
pub struct TimingGuard {
    inner: Arc<TrackerInner>,
    event: Option<CommandEvent>,
    kind: TimingKind,
    started: Instant,
    outcome: Option<Result<(), String>>,
}

impl TimingGuard {
    pub fn with_guild_name(mut self, name: &str) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.guild_name = name.to_string();
        }
        self
    }

    pub fn with_username(mut self, name: &str) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.username = name.to_string();
        }
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.parameters.insert(key.to_string(), value.into());
        }
        self
    }

    /// Close the region as a success
    pub fn finish(mut self) {
        self.outcome = Some(Ok(()));
    }

    /// Close the region as a failure
    pub fn fail(mut self, message: &str) {
        self.outcome = Some(Err(message.to_string()));
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let outcome = self.outcome.take().unwrap_or_else(|| {
            let reason = if std::thread::panicking() { "panicked" } else { "cancelled" };
            Err(reason.to_string())
        });

        if let Some(event) = self.event.take() {
            self.inner.complete(event, self.kind, elapsed, outcome);
        }
    }
}

/// Times commands and reports on their performance
#[derive(Clone)]
pub struct PerformanceTracker {
    inner: Arc<TrackerInner>,
    recorder: EventRecorder,
}

impl PerformanceTracker {
    /// Create a tracker with a background task forwarding timed events to `recorder`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        cache: MetricsCache,
        recorder: EventRecorder,
        thresholds: PerformanceThresholds,
    ) -> Result<Self, MonitorError> {
        thresholds.validate()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Self::event_forwarder(recorder.clone(), receiver));

        info!("PerformanceTracker initialized");
        Ok(PerformanceTracker {
            inner: Arc::new(TrackerInner {
                cache,
                thresholds,
                sender,
            }),
            recorder,
        })
    }

    /// Open a timing region for `command`
    pub fn begin(&self, command: &str, guild_id: &str, user_id: &str) -> TimingGuard {
        self.begin_kind(TimingKind::Command, command, guild_id, user_id)
    }

    pub fn begin_kind(&self, kind: TimingKind, name: &str, guild_id: &str, user_id: &str) -> TimingGuard {
        TimingGuard {
            inner: self.inner.clone(),
            event: Some(CommandEvent::new(guild_id, user_id, name)),
            kind,
            started: Instant::now(),
            outcome: None,
        }
    }

    /// Run `work` inside a timing region and return its result untouched
    pub async fn track<F, T, E>(&self, command: &str, guild_id: &str, user_id: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let guard = self.begin(command, guild_id, user_id);
        match work.await {
            Ok(value) => {
                guard.finish();
                Ok(value)
            }
            Err(e) => {
                guard.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Record a latency measured elsewhere (voice connects, response round trips)
    pub fn record_latency(&self, kind: TimingKind, name: &str, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.inner.cache.record(name, seconds, Utc::now());

        if seconds > kind.threshold(&self.inner.thresholds) {
            warn!("Slow {} detected: {} took {:.2}s", kind.as_str(), name, seconds);
        }
    }

    /// Wait until every timed event queued so far has been handed to the recorder
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if let Err(e) = self.inner.sender.send(Forward::Flush(done)) {
            warn!("Failed to queue flush request: {e}");
            return;
        }
        let _ = wait.await;
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.inner.cache
    }

    pub fn thresholds(&self) -> &PerformanceThresholds {
        &self.inner.thresholds
    }

    /// Per-command duration statistics for `guild_id` over the trailing `days`,
    /// alongside the process-wide cache summary
    pub async fn performance_stats(&self, guild_id: &str, days: u32) -> Outcome<PerformanceStats> {
        let context = format!("guild={guild_id} days={days}");
        let fallback = PerformanceStats {
            slowest_commands: Vec::new(),
            cache: self.inner.cache.summary(),
        };

        safe_execute("get_performance_stats", &context, self.recorder.timeout(), fallback, async {
            let events = self
                .recorder
                .events_since(Some(guild_id), ChronoDuration::days(days as i64))
                .await?;

            let mut slowest = summarize_durations(&events);
            slowest.truncate(SLOWEST_COMMANDS_LIMIT);

            Ok(PerformanceStats {
                slowest_commands: slowest,
                cache: self.inner.cache.summary(),
            })
        })
        .await
    }

    /// Commands in `guild_id` whose average duration over the last week exceeds
    /// `threshold` (default: the command threshold)
    pub async fn bottlenecks(&self, guild_id: &str, threshold: Option<f64>) -> Outcome<Vec<Bottleneck>> {
        let threshold = threshold.unwrap_or(self.inner.thresholds.command_slow);
        let context = format!("guild={guild_id} threshold={threshold}");

        safe_execute("detect_bottlenecks", &context, self.recorder.timeout(), Vec::new(), async {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(MonitorError::config(format!("bottleneck threshold must be positive, got {threshold}")));
            }

            let events = self
                .recorder
                .events_since(Some(guild_id), ChronoDuration::days(BOTTLENECK_WINDOW_DAYS))
                .await?;
            let found = find_bottlenecks(&events, threshold);
            debug!("Found {} bottlenecks in guild {guild_id}", found.len());
            Ok(found)
        })
        .await
    }

    /// Background task that hands timed events to the recorder
    async fn event_forwarder(recorder: EventRecorder, mut receiver: mpsc::UnboundedReceiver<Forward>) {
        debug!("PerformanceTracker event forwarder started");

        while let Some(message) = receiver.recv().await {
            match message {
                Forward::Event(event) => {
                    // Failures are already logged by the recorder
                    recorder.log(event).await;
                }
                Forward::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        debug!("PerformanceTracker event forwarder stopped");
    }
}

struct DurationAccumulator<'a> {
    command: &'a str,
    sum: f64,
    min: f64,
    max: f64,
    count: i64,
    last: DateTime<Utc>,
}

fn accumulate(events: &[CommandEvent]) -> Vec<DurationAccumulator<'_>> {
    let mut by_command: HashMap<&str, DurationAccumulator<'_>> = HashMap::new();

    for event in events {
        let acc = by_command.entry(event.command.as_str()).or_insert(DurationAccumulator {
            command: event.command.as_str(),
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
            last: event.timestamp,
        });
        acc.sum += event.duration;
        acc.min = acc.min.min(event.duration);
        acc.max = acc.max.max(event.duration);
        acc.count += 1;
        if event.timestamp > acc.last {
            acc.last = event.timestamp;
        }
    }

    by_command.into_values().collect()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Average first, then name, so output order is stable
fn by_avg_desc(a: (f64, &str), b: (f64, &str)) -> std::cmp::Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

fn summarize_durations(events: &[CommandEvent]) -> Vec<CommandPerformance> {
    let mut summary: Vec<CommandPerformance> = accumulate(events)
        .into_iter()
        .map(|acc| CommandPerformance {
            command: acc.command.to_string(),
            avg_duration: acc.sum / acc.count as f64,
            min_duration: acc.min,
            max_duration: acc.max,
            count: acc.count,
        })
        .collect();

    summary.sort_by(|a, b| by_avg_desc((a.avg_duration, a.command.as_str()), (b.avg_duration, b.command.as_str())));
    for entry in &mut summary {
        entry.avg_duration = round_to(entry.avg_duration, 4);
        entry.min_duration = round_to(entry.min_duration, 4);
        entry.max_duration = round_to(entry.max_duration, 4);
    }
    summary
}

fn find_bottlenecks(events: &[CommandEvent], threshold: f64) -> Vec<Bottleneck> {
    let mut found: Vec<Bottleneck> = accumulate(events)
        .into_iter()
        .filter_map(|acc| {
            let avg = acc.sum / acc.count as f64;
            if avg <= threshold {
                return None;
            }
            let severity = if avg >= threshold * 2.0 { Severity::High } else { Severity::Medium };
            Some(Bottleneck {
                command: acc.command.to_string(),
                avg_duration: avg,
                occurrence_count: acc.count,
                last_occurrence: acc.last,
                severity,
            })
        })
        .collect();

    found.sort_by(|a, b| by_avg_desc((a.avg_duration, a.command.as_str()), (b.avg_duration, b.command.as_str())));
    for entry in &mut found {
        entry.avg_duration = round_to(entry.avg_duration, 4);
    }
    found
}
