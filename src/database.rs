use crate::error::MonitorError;
use crate::models::{CommandEvent, DailyDelta, DailyStat, EventFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistent store consumed by the monitoring components
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist an event and return its id
    async fn insert_event(&self, event: &CommandEvent) -> Result<i64, MonitorError>;

    /// Matching events, most recent first
    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<CommandEvent>, MonitorError>;

    /// Apply `delta` to the (guild, date) row, creating it if needed, and return the new row
    async fn upsert_daily(&self, guild_id: &str, date: NaiveDate, delta: &DailyDelta) -> Result<DailyStat, MonitorError>;

    /// Rows for `guild_id` with `from <= date <= to`, oldest first
    async fn query_daily(&self, guild_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStat>, MonitorError>;

    /// Round-trip latency of a trivial query
    async fn ping(&self) -> Result<Duration, MonitorError>;

    /// On-disk size in bytes
    async fn size(&self) -> Result<u64, MonitorError>;

    /// Number of distinct guilds with recorded data
    async fn guild_count(&self) -> Result<i64, MonitorError>;

    /// Delete events and daily rows older than `cutoff`; returns rows removed
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MonitorError>;
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

/// Positional bind value for dynamically built queries
enum Param {
    Text(String),
    Int(i64),
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        let connection = sqlite::open(database_path)
            .with_context(|| format!("Failed to open database: {database_path}"))?;
        let db = Database {
            connection: Arc::new(Mutex::new(connection)),
        };

        db.init_tables().await?;
        info!("Database initialized at: {database_path}");
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        let conn = self.connection.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS command_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL,
                guild_name TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL,
                username TEXT NOT NULL DEFAULT '',
                command TEXT NOT NULL,
                parameters TEXT NOT NULL DEFAULT '{}',
                duration REAL NOT NULL DEFAULT 0,
                success INTEGER NOT NULL DEFAULT 1,
                error_message TEXT NOT NULL DEFAULT '',
                executed_at INTEGER NOT NULL
            )",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_guild_time
             ON command_events(guild_id, executed_at)",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_command
             ON command_events(guild_id, command)",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL,
                date TEXT NOT NULL,
                songs_played INTEGER NOT NULL DEFAULT 0,
                total_playtime INTEGER NOT NULL DEFAULT 0,
                total_skips INTEGER NOT NULL DEFAULT 0,
                total_pauses INTEGER NOT NULL DEFAULT 0,
                commands_executed INTEGER NOT NULL DEFAULT 0,
                unique_users INTEGER NOT NULL DEFAULT 0,
                UNIQUE(guild_id, date)
            )",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stats_guild_date
             ON daily_stats(guild_id, date)",
        )?;

        // Exact per-day user sets behind daily_stats.unique_users
        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_users (
                guild_id TEXT NOT NULL,
                date TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY(guild_id, date, user_id)
            )",
        )?;

        Ok(())
    }

    // Command Event Methods
    pub async fn insert_command_event(&self, event: &CommandEvent) -> Result<i64> {
        let parameters = serde_json::to_string(&event.parameters)?;
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO command_events (
                guild_id, guild_name, user_id, username, command,
                parameters, duration, success, error_message, executed_at
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        statement.bind((1, event.guild_id.as_str()))?;
        statement.bind((2, event.guild_name.as_str()))?;
        statement.bind((3, event.user_id.as_str()))?;
        statement.bind((4, event.username.as_str()))?;
        statement.bind((5, event.command.as_str()))?;
        statement.bind((6, parameters.as_str()))?;
        statement.bind((7, event.duration))?;
        statement.bind((8, if event.success { 1i64 } else { 0i64 }))?;
        statement.bind((9, event.error_message.as_deref().unwrap_or("")))?;
        statement.bind((10, event.timestamp.timestamp_micros()))?;
        statement.next()?;

        let mut stmt = conn.prepare("SELECT last_insert_rowid()")?;
        stmt.next()?;
        let id = stmt.read::<i64, _>(0)?;
        Ok(id)
    }

    pub async fn get_command_events(&self, filter: &EventFilter) -> Result<Vec<CommandEvent>> {
        let mut query = String::from(
            "SELECT id, guild_id, guild_name, user_id, username, command,
                    parameters, duration, success, error_message, executed_at
             FROM command_events WHERE 1=1",
        );
        let mut params = Vec::new();

        if let Some(ref guild_id) = filter.guild_id {
            query.push_str(" AND guild_id = ?");
            params.push(Param::Text(guild_id.clone()));
        }
        if let Some(ref user_id) = filter.user_id {
            query.push_str(" AND user_id = ?");
            params.push(Param::Text(user_id.clone()));
        }
        if let Some(ref command) = filter.command {
            query.push_str(" AND command = ?");
            params.push(Param::Text(command.clone()));
        }
        if let Some(since) = filter.since {
            query.push_str(" AND executed_at >= ?");
            params.push(Param::Int(since.timestamp_micros()));
        }
        if let Some(until) = filter.until {
            query.push_str(" AND executed_at < ?");
            params.push(Param::Int(until.timestamp_micros()));
        }
        if filter.success_only {
            query.push_str(" AND success = 1");
        }

        query.push_str(" ORDER BY executed_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params.push(Param::Int(limit as i64));
        }

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(&query)?;
        for (i, param) in params.iter().enumerate() {
            match param {
                Param::Text(value) => statement.bind((i + 1, value.as_str()))?,
                Param::Int(value) => statement.bind((i + 1, *value))?,
            }
        }

        read_rows(&mut statement, read_command_event)
    }

    // Daily Statistics Methods
    pub async fn upsert_daily_stat(&self, guild_id: &str, date: NaiveDate, delta: &DailyDelta) -> Result<DailyStat> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let conn = self.connection.lock().await;

        conn.execute("BEGIN")?;
        let applied = apply_daily_delta(&conn, guild_id, &date_str, delta);
        match applied {
            Ok(()) => conn.execute("COMMIT")?,
            Err(e) => {
                conn.execute("ROLLBACK")?;
                return Err(e);
            }
        }

        let mut statement = conn.prepare(
            "SELECT guild_id, date, songs_played, total_playtime, total_skips,
                    total_pauses, commands_executed, unique_users
             FROM daily_stats WHERE guild_id = ? AND date = ?",
        )?;
        statement.bind((1, guild_id))?;
        statement.bind((2, date_str.as_str()))?;

        match statement.next()? {
            State::Row => {
                let row = read_daily_stat(&statement)?;
                debug!("Updated daily stats for guild {guild_id} on {date_str}");
                Ok(row)
            }
            State::Done => anyhow::bail!("daily_stats row for {guild_id} on {date_str} vanished after upsert"),
        }
    }

    pub async fn get_daily_stats(&self, guild_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStat>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT guild_id, date, songs_played, total_playtime, total_skips,
                    total_pauses, commands_executed, unique_users
             FROM daily_stats
             WHERE guild_id = ? AND date >= ? AND date <= ?
             ORDER BY date ASC",
        )?;
        statement.bind((1, guild_id))?;
        statement.bind((2, from.format(DATE_FORMAT).to_string().as_str()))?;
        statement.bind((3, to.format(DATE_FORMAT).to_string().as_str()))?;

        read_rows(&mut statement, read_daily_stat)
    }

    // Health Check Methods
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT 1")?;
        statement.next()?;
        statement.read::<i64, _>(0)?;
        Ok(started.elapsed())
    }

    pub async fn database_size(&self) -> Result<u64> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )?;
        statement.next()?;
        let size = statement.read::<i64, _>(0)?;
        Ok(size.max(0) as u64)
    }

    pub async fn count_guilds(&self) -> Result<i64> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT COUNT(*) FROM (
                SELECT guild_id FROM command_events
                UNION
                SELECT guild_id FROM daily_stats
             )",
        )?;
        statement.next()?;
        Ok(statement.read::<i64, _>(0)?)
    }

    pub async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_date = cutoff.date_naive().format(DATE_FORMAT).to_string();
        let conn = self.connection.lock().await;
        let mut removed = 0u64;

        let mut statement = conn.prepare("DELETE FROM command_events WHERE executed_at < ?")?;
        statement.bind((1, cutoff.timestamp_micros()))?;
        statement.next()?;
        removed += changes(&conn)?;

        let mut statement = conn.prepare("DELETE FROM daily_stats WHERE date < ?")?;
        statement.bind((1, cutoff_date.as_str()))?;
        statement.next()?;
        removed += changes(&conn)?;

        let mut statement = conn.prepare("DELETE FROM daily_users WHERE date < ?")?;
        statement.bind((1, cutoff_date.as_str()))?;
        statement.next()?;

        info!("Cleaned up {removed} monitoring rows older than {cutoff}");
        Ok(removed)
    }
}

fn apply_daily_delta(conn: &Connection, guild_id: &str, date: &str, delta: &DailyDelta) -> Result<()> {
    let mut statement = conn.prepare(
        "INSERT INTO daily_stats (
            guild_id, date, songs_played, total_playtime, total_skips,
            total_pauses, commands_executed
         )
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(guild_id, date) DO UPDATE SET
            songs_played = songs_played + excluded.songs_played,
            total_playtime = total_playtime + excluded.total_playtime,
            total_skips = total_skips + excluded.total_skips,
            total_pauses = total_pauses + excluded.total_pauses,
            commands_executed = commands_executed + excluded.commands_executed",
    )?;
    statement.bind((1, guild_id))?;
    statement.bind((2, date))?;
    statement.bind((3, delta.songs_played))?;
    statement.bind((4, delta.playtime))?;
    statement.bind((5, delta.skips))?;
    statement.bind((6, delta.pauses))?;
    statement.bind((7, delta.commands))?;
    statement.next()?;

    if let Some(ref user_id) = delta.user_id {
        let mut statement = conn.prepare(
            "INSERT OR IGNORE INTO daily_users (guild_id, date, user_id) VALUES (?, ?, ?)",
        )?;
        statement.bind((1, guild_id))?;
        statement.bind((2, date))?;
        statement.bind((3, user_id.as_str()))?;
        statement.next()?;

        let mut statement = conn.prepare(
            "UPDATE daily_stats
             SET unique_users = (
                SELECT COUNT(*) FROM daily_users WHERE guild_id = ? AND date = ?
             )
             WHERE guild_id = ? AND date = ?",
        )?;
        statement.bind((1, guild_id))?;
        statement.bind((2, date))?;
        statement.bind((3, guild_id))?;
        statement.bind((4, date))?;
        statement.next()?;
    }

    Ok(())
}

fn changes(conn: &Connection) -> Result<u64> {
    let mut statement = conn.prepare("SELECT changes()")?;
    statement.next()?;
    Ok(statement.read::<i64, _>(0)?.max(0) as u64)
}

/// Step through every row; a failed step is an error, not the end of the result set
fn read_rows<T>(statement: &mut Statement<'_>, read: fn(&Statement<'_>) -> Result<T>) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    while let State::Row = statement.next()? {
        rows.push(read(statement)?);
    }
    Ok(rows)
}

fn read_command_event(statement: &Statement<'_>) -> Result<CommandEvent> {
    let parameters_json = statement.read::<String, _>("parameters")?;
    // Unparseable parameters degrade to an empty map
    let parameters: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&parameters_json).unwrap_or_default();

    let error_message = statement.read::<String, _>("error_message")?;
    let executed_at = statement.read::<i64, _>("executed_at")?;
    let timestamp = DateTime::<Utc>::from_timestamp_micros(executed_at)
        .ok_or_else(|| anyhow::anyhow!("invalid executed_at value {executed_at}"))?;

    Ok(CommandEvent {
        id: Some(statement.read::<i64, _>("id")?),
        guild_id: statement.read::<String, _>("guild_id")?,
        guild_name: statement.read::<String, _>("guild_name")?,
        user_id: statement.read::<String, _>("user_id")?,
        username: statement.read::<String, _>("username")?,
        command: statement.read::<String, _>("command")?,
        parameters,
        duration: statement.read::<f64, _>("duration")?,
        success: statement.read::<i64, _>("success")? != 0,
        error_message: if error_message.is_empty() { None } else { Some(error_message) },
        timestamp,
    })
}

fn read_daily_stat(statement: &Statement<'_>) -> Result<DailyStat> {
    let date = statement.read::<String, _>("date")?;
    Ok(DailyStat {
        guild_id: statement.read::<String, _>("guild_id")?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .with_context(|| format!("invalid date in daily_stats: {date}"))?,
        songs_played: statement.read::<i64, _>("songs_played")?,
        total_playtime: statement.read::<i64, _>("total_playtime")?,
        total_skips: statement.read::<i64, _>("total_skips")?,
        total_pauses: statement.read::<i64, _>("total_pauses")?,
        commands_executed: statement.read::<i64, _>("commands_executed")?,
        unique_users: statement.read::<i64, _>("unique_users")?,
    })
}

#[async_trait]
impl Store for Database {
    async fn insert_event(&self, event: &CommandEvent) -> Result<i64, MonitorError> {
        Ok(self.insert_command_event(event).await?)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<CommandEvent>, MonitorError> {
        Ok(self.get_command_events(filter).await?)
    }

    async fn upsert_daily(&self, guild_id: &str, date: NaiveDate, delta: &DailyDelta) -> Result<DailyStat, MonitorError> {
        Ok(self.upsert_daily_stat(guild_id, date, delta).await?)
    }

    async fn query_daily(&self, guild_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStat>, MonitorError> {
        Ok(self.get_daily_stats(guild_id, from, to).await?)
    }

    async fn ping(&self) -> Result<Duration, MonitorError> {
        Ok(Database::ping(self).await?)
    }

    async fn size(&self) -> Result<u64, MonitorError> {
        Ok(self.database_size().await?)
    }

    async fn guild_count(&self) -> Result<i64, MonitorError> {
        Ok(self.count_guilds().await?)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MonitorError> {
        Ok(self.cleanup_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_query_event() {
        let db = Database::new(":memory:").await.unwrap();
        let event = CommandEvent::new("G1", "U1", "play")
            .guild_name("Test Server")
            .username("TestUser")
            .parameter("song", "test.mp3")
            .duration(0.5);

        let id = db.insert_command_event(&event).await.unwrap();
        let events = db.get_command_events(&EventFilter::default().guild("G1")).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, Some(id));
        assert_eq!(events[0].parameters.get("song"), Some(&serde_json::json!("test.mp3")));
        assert_eq!(events[0].timestamp, event.timestamp);
        assert_eq!(events[0].error_message, None);
    }

    #[tokio::test]
    async fn test_event_filters() {
        let db = Database::new(":memory:").await.unwrap();
        let base = Utc::now();
        db.insert_command_event(&CommandEvent::new("G1", "U1", "play").at(base - ChronoDuration::hours(3)))
            .await
            .unwrap();
        db.insert_command_event(&CommandEvent::new("G1", "U2", "skip").failed("empty queue").at(base))
            .await
            .unwrap();
        db.insert_command_event(&CommandEvent::new("G2", "U1", "play").at(base)).await.unwrap();

        let by_user = db.get_command_events(&EventFilter::default().guild("G1").user("U2")).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].command, "skip");
        assert_eq!(by_user[0].error_message.as_deref(), Some("empty queue"));

        let recent = db
            .get_command_events(&EventFilter::default().guild("G1").since(base - ChronoDuration::hours(1)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);

        let successes = db.get_command_events(&EventFilter::default().guild("G1").success_only()).await.unwrap();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].command, "play");

        let older = db.get_command_events(&EventFilter::default().guild("G1").until(base)).await.unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].command, "play");

        let window = db
            .get_command_events(
                &EventFilter::default()
                    .since(base - ChronoDuration::hours(4))
                    .until(base + ChronoDuration::seconds(1)),
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_read_rows_surfaces_step_errors() {
        let conn = sqlite::open(":memory:").unwrap();
        conn.execute("CREATE TABLE samples (value INTEGER)").unwrap();
        let mut insert = conn.prepare("INSERT INTO samples (value) VALUES (?)").unwrap();
        for value in [1, i64::MIN] {
            insert.reset().unwrap();
            insert.bind((1, value)).unwrap();
            insert.next().unwrap();
        }

        // abs() of i64::MIN overflows on the second row
        let mut statement = conn.prepare("SELECT abs(value) FROM samples ORDER BY rowid").unwrap();
        let result = read_rows(&mut statement, |row| Ok(row.read::<i64, _>(0)?));
        assert!(result.is_err());

        let mut statement = conn.prepare("SELECT 1 UNION ALL SELECT 2").unwrap();
        let values = read_rows(&mut statement, |row| Ok(row.read::<i64, _>(0)?)).unwrap();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_upsert_daily_accumulates_and_counts_distinct_users() {
        let db = Database::new(":memory:").await.unwrap();
        let date = day(2024, 5, 1);

        let song = DailyDelta { songs_played: 1, playtime: 180, user_id: Some("U1".to_string()), ..Default::default() };
        db.upsert_daily_stat("G1", date, &song).await.unwrap();
        db.upsert_daily_stat("G1", date, &song).await.unwrap();
        let other = DailyDelta { skips: 1, user_id: Some("U2".to_string()), ..Default::default() };
        let row = db.upsert_daily_stat("G1", date, &other).await.unwrap();

        assert_eq!(row.songs_played, 2);
        assert_eq!(row.total_playtime, 360);
        assert_eq!(row.total_skips, 1);
        assert_eq!(row.unique_users, 2);
    }

    #[tokio::test]
    async fn test_query_daily_range_is_inclusive() {
        let db = Database::new(":memory:").await.unwrap();
        let delta = DailyDelta { commands: 1, ..Default::default() };
        for d in 1..=5 {
            db.upsert_daily_stat("G1", day(2024, 5, d), &delta).await.unwrap();
        }

        let rows = db.get_daily_stats("G1", day(2024, 5, 2), day(2024, 5, 4)).await.unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2024, 5, 2), day(2024, 5, 3), day(2024, 5, 4)]);
    }

    #[tokio::test]
    async fn test_health_checks() {
        let db = Database::new(":memory:").await.unwrap();
        db.insert_command_event(&CommandEvent::new("G1", "U1", "play")).await.unwrap();
        db.upsert_daily_stat("G2", day(2024, 5, 1), &DailyDelta::default()).await.unwrap();

        assert!(db.ping().await.is_ok());
        assert!(db.database_size().await.unwrap() > 0);
        assert_eq!(db.count_guilds().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_before_removes_old_rows() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        db.insert_command_event(&CommandEvent::new("G1", "U1", "play").at(now - ChronoDuration::days(40)))
            .await
            .unwrap();
        db.insert_command_event(&CommandEvent::new("G1", "U1", "play").at(now)).await.unwrap();
        db.upsert_daily_stat("G1", (now - ChronoDuration::days(40)).date_naive(), &DailyDelta::default())
            .await
            .unwrap();

        let removed = db.cleanup_before(now - ChronoDuration::days(30)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(db.get_command_events(&EventFilter::default()).await.unwrap().len(), 1);
    }
}
