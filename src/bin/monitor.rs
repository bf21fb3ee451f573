//! Monitoring diagnostics entry point
//!
//! Opens the monitoring store and prints one report as JSON:
//! - `health` - current health report
//! - `weekly <guild>` / `monthly <guild>` - usage rollups
//! - `stats <guild> [days]` - command statistics
//! - `perf <guild> [days]` - slowest commands and bottlenecks

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use log::info;
use serde::Serialize;

use bot_monitoring::{Bottleneck, MonitoringConfig, MonitoringSystem, PerformanceStats, ReportPeriod};

const USAGE: &str = "usage: bot-monitor <health | weekly <guild> | monthly <guild> | stats <guild> [days] | perf <guild> [days]>";

#[derive(Serialize)]
struct PerformanceOverview {
    stats: PerformanceStats,
    bottlenecks: Vec<Bottleneck>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn guild_arg(args: &[String]) -> Result<&str> {
    match args.get(1) {
        Some(guild) => Ok(guild.as_str()),
        None => bail!("{USAGE}"),
    }
}

fn days_arg(args: &[String], default: u32) -> Result<u32> {
    match args.get(2) {
        Some(days) => days.parse().with_context(|| format!("Invalid day count: {days}")),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = MonitoringConfig::auto_load()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    info!("Opening monitoring store at {}", config.database_path);
    let system = MonitoringSystem::open(&config).await?;

    match command.as_str() {
        "health" => print_json(&system.health.report(None).await),
        "weekly" => print_json(system.usage.report(guild_arg(&args)?, ReportPeriod::Weekly).await.value()),
        "monthly" => print_json(system.usage.report(guild_arg(&args)?, ReportPeriod::Monthly).await.value()),
        "stats" => {
            let guild = guild_arg(&args)?;
            print_json(system.logger.stats(guild, days_arg(&args, 7)?).await.value())
        }
        "perf" => {
            let guild = guild_arg(&args)?;
            let stats = system.performance.performance_stats(guild, days_arg(&args, 7)?).await.into_inner();
            let bottlenecks = system.performance.bottlenecks(guild, None).await.into_inner();
            print_json(&PerformanceOverview { stats, bottlenecks })
        }
        other => bail!("Unknown command '{other}'\n{USAGE}"),
    }
}
