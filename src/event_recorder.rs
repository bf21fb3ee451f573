//! # Feature: Command Event Recorder
//!
//! Persists one structured event per executed command and answers history and
//! usage-statistics queries over them.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::clock::Clock;
use crate::database::Store;
use crate::error::{safe_execute, MonitorError, Outcome};
use crate::models::{CommandEvent, EventFilter};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How many commands a ranking keeps
pub const TOP_COMMANDS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandCount {
    pub command: String,
    pub count: i64,
}

/// Command usage over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandStats {
    pub total_commands: i64,
    pub successful_commands: i64,
    /// Percent, 0 when nothing ran
    pub success_rate: f64,
    pub avg_duration: f64,
    pub top_commands: Vec<CommandCount>,
}

impl Default for CommandStats {
    fn default() -> Self {
        CommandStats {
            total_commands: 0,
            successful_commands: 0,
            success_rate: 0.0,
            avg_duration: 0.0,
            top_commands: Vec::new(),
        }
    }
}

impl CommandStats {
    pub fn from_events(events: &[CommandEvent]) -> Self {
        let total = events.len() as i64;
        if total == 0 {
            return CommandStats::default();
        }

        let successful = events.iter().filter(|e| e.success).count() as i64;
        let duration_sum: f64 = events.iter().map(|e| e.duration).sum();

        CommandStats {
            total_commands: total,
            successful_commands: successful,
            success_rate: successful as f64 / total as f64 * 100.0,
            avg_duration: duration_sum / total as f64,
            top_commands: rank_commands(events, TOP_COMMANDS_LIMIT),
        }
    }
}

/// Count events per command; highest count first, ties by name
pub fn rank_commands(events: &[CommandEvent], limit: usize) -> Vec<CommandCount> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for event in events {
        *counts.entry(event.command.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<CommandCount> = counts
        .into_iter()
        .map(|(command, count)| CommandCount {
            command: command.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.command.cmp(&b.command)));
    ranked.truncate(limit);
    ranked
}

/// Writes and queries command events through the store
#[derive(Clone)]
pub struct EventRecorder {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, timeout: Duration) -> Result<Self, MonitorError> {
        if timeout.is_zero() {
            return Err(MonitorError::config("event recorder timeout must be greater than zero"));
        }
        info!("EventRecorder initialized");
        Ok(EventRecorder { store, clock, timeout })
    }

    /// Persist `event`. Returns `false` if it could not be stored.
    pub async fn log(&self, event: CommandEvent) -> bool {
        let event = normalize(event);
        let context = format!("guild={} user={} command={}", event.guild_id, event.user_id, event.command);

        let outcome = safe_execute("log_command", &context, self.timeout, false, async {
            let id = self.store.insert_event(&event).await?;
            debug!(
                "Logged command #{id}: {} by {} in {} ({:.4}s, success={})",
                event.command, event.user_id, event.guild_id, event.duration, event.success
            );
            Ok(true)
        })
        .await;

        outcome.into_inner()
    }

    /// Events for `guild_id` matching `filter`, most recent first, at most `limit`
    pub async fn history(&self, guild_id: &str, filter: EventFilter, limit: usize) -> Outcome<Vec<CommandEvent>> {
        let filter = EventFilter {
            guild_id: Some(guild_id.to_string()),
            limit: Some(limit),
            ..filter
        };
        let context = format!("guild={guild_id}");

        safe_execute("get_command_history", &context, self.timeout, Vec::new(), self.store.query_events(&filter)).await
    }

    /// Usage statistics for `guild_id` over the trailing `days`
    pub async fn stats(&self, guild_id: &str, days: u32) -> Outcome<CommandStats> {
        let context = format!("guild={guild_id} days={days}");

        safe_execute("get_command_stats", &context, self.timeout, CommandStats::default(), async {
            let events = self.events_since(Some(guild_id), ChronoDuration::days(days as i64)).await?;
            Ok(CommandStats::from_events(&events))
        })
        .await
    }

    /// Delete events and daily rows older than `days`. Returns the number of rows removed.
    pub async fn cleanup(&self, days: u32) -> Outcome<u64> {
        let context = format!("days={days}");

        safe_execute("cleanup", &context, self.timeout, 0, async {
            let cutoff = self.window_start(ChronoDuration::days(days as i64))?;
            let removed = self.store.purge_before(cutoff).await?;
            info!("Cleanup removed {removed} rows older than {days} days");
            Ok(removed)
        })
        .await
    }

    /// Raw events in the trailing `window`, without the safe-execution boundary
    pub(crate) async fn events_since(
        &self,
        guild_id: Option<&str>,
        window: ChronoDuration,
    ) -> Result<Vec<CommandEvent>, MonitorError> {
        let filter = EventFilter {
            guild_id: guild_id.map(str::to_string),
            since: Some(self.window_start(window)?),
            ..Default::default()
        };
        self.store.query_events(&filter).await
    }

    /// Start of the trailing `window`; windows reaching past the calendar range are rejected
    fn window_start(&self, window: ChronoDuration) -> Result<DateTime<Utc>, MonitorError> {
        self.clock
            .now()
            .checked_sub_signed(window)
            .ok_or_else(|| MonitorError::config(format!("window of {} days is out of range", window.num_days())))
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Repair events that would break the recorded-event invariants
fn normalize(mut event: CommandEvent) -> CommandEvent {
    if !event.duration.is_finite() || event.duration < 0.0 {
        warn!(
            "Command {} in guild {} reported invalid duration {}; recording 0",
            event.command, event.guild_id, event.duration
        );
        event.duration = 0.0;
    }

    if !event.success && event.error_message.is_none() {
        warn!(
            "Failed command {} in guild {} has no error message",
            event.command, event.guild_id
        );
        event.error_message = Some("unknown error".to_string());
    }

    event
}
