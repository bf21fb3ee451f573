//! # Feature: Monitoring System
//!
//! Wires the event recorder, performance tracker, usage aggregator and health
//! evaluator over one shared store.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::clock::{Clock, SystemClock};
use crate::config::MonitoringConfig;
use crate::database::{Database, Store};
use crate::error::MonitorError;
use crate::event_recorder::EventRecorder;
use crate::health::{HealthEvaluator, ResourceSampler, SysinfoSampler};
use crate::metrics_cache::MetricsCache;
use crate::performance::PerformanceTracker;
use crate::usage::UsageAggregator;
use log::info;
use std::sync::Arc;

/// The four monitoring handles. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct MonitoringSystem {
    pub logger: EventRecorder,
    pub performance: PerformanceTracker,
    pub usage: UsageAggregator,
    pub health: HealthEvaluator,
}

impl MonitoringSystem {
    /// Open the SQLite store named in `config` and build every handle on it
    pub async fn open(config: &MonitoringConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        let database = Database::new(&config.database_path).await?;
        info!("Monitoring store opened at {}", config.database_path);
        create_monitoring_system(Arc::new(database), config)
    }

    /// Build every handle from explicit collaborators
    pub fn with_parts(
        store: Arc<dyn Store>,
        config: &MonitoringConfig,
        clock: Arc<dyn Clock>,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let logger = EventRecorder::new(store.clone(), clock, config.operation_timeout())?;
        let cache = MetricsCache::new(config.metrics_capacity)?;
        let performance = PerformanceTracker::new(cache, logger.clone(), config.thresholds.clone())?;
        let usage = UsageAggregator::new(store.clone(), logger.clone());
        let health = HealthEvaluator::new(
            store,
            logger.clone(),
            sampler,
            config.health.clone(),
            config.history_capacity,
        )?;

        info!("Monitoring system initialized");
        Ok(MonitoringSystem {
            logger,
            performance,
            usage,
            health,
        })
    }
}

/// Build the monitoring handles over `store` with the system clock and process sampler.
///
/// Must be called from within a Tokio runtime.
pub fn create_monitoring_system(
    store: Arc<dyn Store>,
    config: &MonitoringConfig,
) -> Result<MonitoringSystem, MonitorError> {
    let sampler = SysinfoSampler::new()?;
    MonitoringSystem::with_parts(store, config, Arc::new(SystemClock), Arc::new(sampler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandEvent;

    fn memory_config() -> MonitoringConfig {
        MonitoringConfig {
            database_path: ":memory:".to_string(),
            ..MonitoringConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_wires_shared_store() {
        let system = MonitoringSystem::open(&memory_config()).await.unwrap();

        assert!(system.logger.log(CommandEvent::new("G1", "U1", "play")).await);
        assert!(system.usage.record_command("G1", "U1").await);

        let stats = system.logger.stats("G1", 1).await.into_inner();
        assert_eq!(stats.total_commands, 1);
        let daily = system.usage.daily("G1").await.into_inner();
        assert_eq!(daily.commands_executed, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_prevents_construction() {
        let config = MonitoringConfig {
            metrics_capacity: 0,
            ..memory_config()
        };
        assert!(matches!(
            MonitoringSystem::open(&config).await,
            Err(MonitorError::Config(_))
        ));
    }
}
