//! Records shared between the monitoring components and the store.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One executed command, as persisted by the event recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Store-assigned id, `None` until persisted
    pub id: Option<i64>,
    pub guild_id: String,
    pub guild_name: String,
    pub user_id: String,
    pub username: String,
    pub command: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Seconds
    pub duration: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommandEvent {
    /// A successful, zero-duration event stamped now
    pub fn new(guild_id: &str, user_id: &str, command: &str) -> Self {
        CommandEvent {
            id: None,
            guild_id: guild_id.to_string(),
            guild_name: String::new(),
            user_id: user_id.to_string(),
            username: String::new(),
            command: command.to_string(),
            parameters: BTreeMap::new(),
            duration: 0.0,
            success: true,
            error_message: None,
            // Microseconds is what the store keeps
            timestamp: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn guild_name(mut self, name: &str) -> Self {
        self.guild_name = name.to_string();
        self
    }

    pub fn username(mut self, name: &str) -> Self {
        self.username = name.to_string();
        self
    }

    pub fn parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn failed(mut self, message: &str) -> Self {
        self.success = false;
        self.error_message = Some(message.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(6);
        self
    }
}

/// Query over persisted command events
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub guild_id: Option<String>,
    pub user_id: Option<String>,
    pub command: Option<String>,
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub until: Option<DateTime<Utc>>,
    pub success_only: bool,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn guild(mut self, guild_id: &str) -> Self {
        self.guild_id = Some(guild_id.to_string());
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn success_only(mut self) -> Self {
        self.success_only = true;
        self
    }
}

/// Per-guild counters for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub guild_id: String,
    pub date: NaiveDate,
    pub songs_played: i64,
    /// Seconds
    pub total_playtime: i64,
    pub total_skips: i64,
    pub total_pauses: i64,
    pub commands_executed: i64,
    pub unique_users: i64,
}

impl DailyStat {
    /// Zeroed row for a day nothing was recorded on
    pub fn empty(guild_id: &str, date: NaiveDate) -> Self {
        DailyStat {
            guild_id: guild_id.to_string(),
            date,
            songs_played: 0,
            total_playtime: 0,
            total_skips: 0,
            total_pauses: 0,
            commands_executed: 0,
            unique_users: 0,
        }
    }

    pub fn has_activity(&self) -> bool {
        self.songs_played > 0
            || self.total_playtime > 0
            || self.total_skips > 0
            || self.total_pauses > 0
            || self.commands_executed > 0
            || self.unique_users > 0
    }
}

/// Increments applied to a daily row in one upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyDelta {
    pub songs_played: i64,
    pub playtime: i64,
    pub skips: i64,
    pub pauses: i64,
    pub commands: i64,
    /// Added to the day's unique-user set
    pub user_id: Option<String>,
}
