//! # Feature: Usage Statistics
//!
//! Per-guild daily counters (songs, playtime, skips, pauses, commands, unique
//! users) and weekly/monthly rollups over them.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::clock::Clock;
use crate::database::Store;
use crate::error::{safe_execute, MonitorError, Outcome};
use crate::event_recorder::{rank_commands, CommandCount, EventRecorder, TOP_COMMANDS_LIMIT};
use crate::models::{DailyDelta, DailyStat};
use chrono::{Duration as ChronoDuration, NaiveDate};
use dashmap::DashMap;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Rollup window for usage reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub fn days(&self) -> u32 {
        match self {
            ReportPeriod::Weekly => 7,
            ReportPeriod::Monthly => 30,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
        }
    }
}

impl TryFrom<u32> for ReportPeriod {
    type Error = MonitorError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(ReportPeriod::Weekly),
            30 => Ok(ReportPeriod::Monthly),
            other => Err(MonitorError::config(format!("report window must be 7 or 30 days, got {other}"))),
        }
    }
}

/// Usage rollup over a trailing window of calendar days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub period: String,
    pub days: u32,
    /// No daily rows in the window
    pub no_data: bool,
    pub active_days: i64,
    pub total_songs: i64,
    pub total_playtime: i64,
    pub total_playtime_hours: f64,
    pub total_skips: i64,
    pub total_pauses: i64,
    pub total_commands: i64,
    pub avg_daily_users: f64,
    pub peak_users: i64,
    pub avg_song_duration: f64,
    pub skip_rate: f64,
    pub top_commands: Vec<CommandCount>,
}

impl UsageReport {
    pub fn empty(period: ReportPeriod) -> Self {
        UsageReport {
            period: period.as_str().to_string(),
            days: period.days(),
            no_data: true,
            active_days: 0,
            total_songs: 0,
            total_playtime: 0,
            total_playtime_hours: 0.0,
            total_skips: 0,
            total_pauses: 0,
            total_commands: 0,
            avg_daily_users: 0.0,
            peak_users: 0,
            avg_song_duration: 0.0,
            skip_rate: 0.0,
            top_commands: Vec::new(),
        }
    }

    /// Roll `rows` up into a report
    pub fn from_rows(period: ReportPeriod, rows: &[DailyStat], top_commands: Vec<CommandCount>) -> Self {
        let mut report = UsageReport::empty(period);
        report.no_data = rows.is_empty();
        report.top_commands = top_commands;

        let mut user_days_sum = 0i64;
        for row in rows {
            report.total_songs += row.songs_played;
            report.total_playtime += row.total_playtime;
            report.total_skips += row.total_skips;
            report.total_pauses += row.total_pauses;
            report.total_commands += row.commands_executed;
            report.peak_users = report.peak_users.max(row.unique_users);

            if row.has_activity() {
                report.active_days += 1;
                user_days_sum += row.unique_users;
            }
        }

        report.total_playtime_hours = round_to(report.total_playtime as f64 / 3600.0, 2);
        if report.active_days > 0 {
            report.avg_daily_users = round_to(user_days_sum as f64 / report.active_days as f64, 1);
        }
        if report.total_songs > 0 {
            report.avg_song_duration = round_to(report.total_playtime as f64 / report.total_songs as f64, 0);
            report.skip_rate = round_to(report.total_skips as f64 / report.total_songs as f64 * 100.0, 2);
        }

        report
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Serialization key for daily increments
type DayKey = (String, NaiveDate);

/// Records usage counters and builds rollup reports
#[derive(Clone)]
pub struct UsageAggregator {
    store: Arc<dyn Store>,
    recorder: EventRecorder,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    day_locks: Arc<DashMap<DayKey, Arc<Mutex<()>>>>,
}

impl UsageAggregator {
    pub fn new(store: Arc<dyn Store>, recorder: EventRecorder) -> Self {
        let clock = recorder.clock().clone();
        let timeout = recorder.timeout();
        info!("UsageAggregator initialized");
        UsageAggregator {
            store,
            recorder,
            clock,
            timeout,
            day_locks: Arc::new(DashMap::new()),
        }
    }

    /// One song played for `duration_secs` by `user_id`
    pub async fn record_song(&self, guild_id: &str, duration_secs: u64, user_id: &str) -> bool {
        let delta = DailyDelta {
            songs_played: 1,
            playtime: duration_secs.min(i64::MAX as u64) as i64,
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };
        self.apply("record_song_played", guild_id, delta).await
    }

    pub async fn record_skip(&self, guild_id: &str) -> bool {
        let delta = DailyDelta {
            skips: 1,
            ..Default::default()
        };
        self.apply("record_skip", guild_id, delta).await
    }

    pub async fn record_pause(&self, guild_id: &str) -> bool {
        let delta = DailyDelta {
            pauses: 1,
            ..Default::default()
        };
        self.apply("record_pause", guild_id, delta).await
    }

    /// One command executed by `user_id`
    pub async fn record_command(&self, guild_id: &str, user_id: &str) -> bool {
        let delta = DailyDelta {
            commands: 1,
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };
        self.apply("record_command", guild_id, delta).await
    }

    /// Today's row, zeroed if nothing was recorded yet
    pub async fn daily(&self, guild_id: &str) -> Outcome<DailyStat> {
        self.daily_on(guild_id, self.clock.today()).await
    }

    pub async fn daily_on(&self, guild_id: &str, date: NaiveDate) -> Outcome<DailyStat> {
        let context = format!("guild={guild_id} date={date}");

        safe_execute("get_daily_stats", &context, self.timeout, DailyStat::empty(guild_id, date), async {
            let rows = self.store.query_daily(guild_id, date, date).await?;
            Ok(rows
                .into_iter()
                .next()
                .unwrap_or_else(|| DailyStat::empty(guild_id, date)))
        })
        .await
    }

    /// Rollup over the trailing `period` calendar days, today included
    pub async fn report(&self, guild_id: &str, period: ReportPeriod) -> Outcome<UsageReport> {
        let context = format!("guild={guild_id} period={}", period.as_str());
        let operation = format!("generate_{}_report", period.as_str());

        safe_execute(&operation, &context, self.timeout, UsageReport::empty(period), async {
            let today = self.clock.today();
            let first_day = today - ChronoDuration::days(period.days() as i64 - 1);
            let rows = self.store.query_daily(guild_id, first_day, today).await?;

            let window_start = first_day
                .and_hms_opt(0, 0, 0)
                .map(|start| start.and_utc())
                .ok_or_else(|| MonitorError::storage(format!("invalid window start {first_day}")))?;
            let window = self.clock.now() - window_start;
            let events = self.recorder.events_since(Some(guild_id), window).await?;

            Ok(UsageReport::from_rows(period, &rows, rank_commands(&events, TOP_COMMANDS_LIMIT)))
        })
        .await
    }

    pub async fn weekly_report(&self, guild_id: &str) -> Outcome<UsageReport> {
        self.report(guild_id, ReportPeriod::Weekly).await
    }

    pub async fn monthly_report(&self, guild_id: &str) -> Outcome<UsageReport> {
        self.report(guild_id, ReportPeriod::Monthly).await
    }

    /// Apply `delta` to today's row, one writer per (guild, day) at a time
    async fn apply(&self, operation: &str, guild_id: &str, delta: DailyDelta) -> bool {
        let context = format!("guild={guild_id} user={}", delta.user_id.as_deref().unwrap_or("-"));

        let outcome = safe_execute(operation, &context, self.timeout, false, async {
            // The day is fixed before locking so an increment lands wholly in one row
            let date = self.clock.today();
            let lock = self.day_lock(guild_id, date);
            let _guard = lock.lock().await;

            let row = self.store.upsert_daily(guild_id, date, &delta).await?;
            debug!(
                "Daily stats for guild {guild_id} on {date}: {} songs, {} commands, {} users",
                row.songs_played, row.commands_executed, row.unique_users
            );
            Ok(true)
        })
        .await;

        outcome.into_inner()
    }

    fn day_lock(&self, guild_id: &str, date: NaiveDate) -> Arc<Mutex<()>> {
        let key = (guild_id.to_string(), date);
        if let Some(lock) = self.day_locks.get(&key) {
            return lock.clone();
        }

        // Locks for closed days go once no writer still holds them
        self.day_locks
            .retain(|(_, day), lock| *day >= date || Arc::strong_count(lock) > 1);
        self.day_locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
