//! # Feature: Metrics Cache
//!
//! Fixed-capacity, per-metric sample buffers with strict FIFO eviction.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_METRICS_CAPACITY: usize = 1000;

/// Capacity-checked double-ended queue; pushing onto a full buffer drops the oldest entry
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::config("ring buffer capacity must be greater than zero"));
        }
        Ok(RingBuffer {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append `item`, returning the evicted entry if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// One timing measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    /// Seconds
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of everything currently cached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSummary {
    pub total_cached: usize,
    pub metric_types: usize,
    pub oldest_metric: Option<DateTime<Utc>>,
}

/// Per-name sample buffers.
///
/// Writers to one name are serialized by the map's shard lock; reads copy a
/// consistent snapshot out of the buffer.
#[derive(Clone)]
pub struct MetricsCache {
    buffers: Arc<DashMap<String, RingBuffer<MetricSample>>>,
    capacity: usize,
}

impl MetricsCache {
    pub fn new(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::config("metrics cache capacity must be greater than zero"));
        }
        Ok(MetricsCache {
            buffers: Arc::new(DashMap::new()),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, name: &str, duration: f64, timestamp: DateTime<Utc>) {
        self.push(MetricSample {
            name: name.to_string(),
            duration,
            timestamp,
        });
    }

    pub fn push(&self, sample: MetricSample) {
        let capacity = self.capacity;
        let mut buffer = self
            .buffers
            .entry(sample.name.clone())
            .or_insert_with(|| RingBuffer {
                items: VecDeque::with_capacity(capacity),
                capacity,
            });
        buffer.push(sample);
    }

    /// Samples for `name`, oldest first
    pub fn snapshot(&self, name: &str) -> Vec<MetricSample> {
        self.buffers
            .get(name)
            .map(|buffer| buffer.snapshot())
            .unwrap_or_default()
    }

    pub fn len(&self, name: &str) -> usize {
        self.buffers.get(name).map(|buffer| buffer.len()).unwrap_or(0)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn summary(&self) -> CacheSummary {
        let mut total_cached = 0;
        let mut metric_types = 0;
        let mut oldest_metric: Option<DateTime<Utc>> = None;

        for entry in self.buffers.iter() {
            let buffer = entry.value();
            if buffer.is_empty() {
                continue;
            }
            metric_types += 1;
            total_cached += buffer.len();
            if let Some(front) = buffer.front() {
                oldest_metric = Some(match oldest_metric {
                    Some(current) if current <= front.timestamp => current,
                    _ => front.timestamp,
                });
            }
        }

        CacheSummary {
            total_cached,
            metric_types,
            oldest_metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_rejects_zero_capacity() {
        assert!(matches!(RingBuffer::<u8>::new(0), Err(MonitorError::Config(_))));
        assert!(MetricsCache::new(0).is_err());
    }

    #[test]
    fn test_ring_buffer_keeps_most_recent_in_push_order() {
        let mut buffer = RingBuffer::new(3).unwrap();
        for i in 0..10 {
            buffer.push(i);
            assert!(buffer.len() <= 3);
        }
        assert_eq!(buffer.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn test_ring_buffer_returns_evicted_item() {
        let mut buffer = RingBuffer::new(2).unwrap();
        assert_eq!(buffer.push("a"), None);
        assert_eq!(buffer.push("b"), None);
        assert_eq!(buffer.push("c"), Some("a"));
    }

    #[test]
    fn test_cache_caps_each_key_at_default_capacity() {
        let cache = MetricsCache::new(DEFAULT_METRICS_CAPACITY).unwrap();
        let now = Utc::now();
        for i in 0..1500 {
            cache.record("play", i as f64, now);
        }
        cache.record("skip", 0.1, now);

        let samples = cache.snapshot("play");
        assert_eq!(samples.len(), 1000);
        assert_eq!(samples.first().unwrap().duration, 500.0);
        assert_eq!(samples.last().unwrap().duration, 1499.0);
        assert_eq!(cache.len("skip"), 1);
    }

    #[test]
    fn test_summary_counts_all_keys() {
        let cache = MetricsCache::new(10).unwrap();
        let early = Utc::now() - chrono::Duration::minutes(5);
        cache.record("play", 0.2, Utc::now());
        cache.record("skip", 0.1, early);
        cache.record("skip", 0.3, Utc::now());

        let summary = cache.summary();
        assert_eq!(summary.total_cached, 3);
        assert_eq!(summary.metric_types, 2);
        assert_eq!(summary.oldest_metric, Some(early));
        assert_eq!(cache.names(), vec!["play".to_string(), "skip".to_string()]);
    }

    #[test]
    fn test_concurrent_writers_never_exceed_capacity() {
        let cache = MetricsCache::new(100).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        cache.record("play", i as f64, Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len("play"), 100);
    }
}
