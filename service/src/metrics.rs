//! Per-path request timing collected by the request logging middleware.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct PathTiming {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl PathTiming {
    fn new(duration: Duration) -> Self {
        Self {
            count: 1,
            total: duration,
            min: duration,
            max: duration,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
    }

    /// Mean duration in milliseconds.
    fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            as_millis(self.total) / self.count as f64
        }
    }
}

/// Timing figures for one path, in the units exposed by `/api/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMetrics {
    pub path: String,
    pub count: u64,
    pub avg_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub total_time_s: f64,
}

#[derive(Debug, Default)]
pub struct RequestMetrics {
    total_requests: AtomicU64,
    paths: DashMap<String, PathTiming>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &str, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.paths
            .entry(path.to_string())
            .and_modify(|timing| timing.record(duration))
            .or_insert_with(|| PathTiming::new(duration));
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn requests_by_path(&self) -> BTreeMap<String, u64> {
        self.paths
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count))
            .collect()
    }

    /// Mean response time over every recorded request, in milliseconds.
    pub fn average_response_time_ms(&self) -> f64 {
        let (count, total) = self
            .paths
            .iter()
            .fold((0u64, Duration::ZERO), |(count, total), entry| {
                (count + entry.count, total + entry.total)
            });

        if count == 0 {
            0.0
        } else {
            as_millis(total) / count as f64
        }
    }

    /// Snapshot of every path, ordered by path.
    pub fn snapshot(&self) -> Vec<PathMetrics> {
        let mut metrics: Vec<PathMetrics> = self
            .paths
            .iter()
            .map(|entry| {
                let timing = entry.value();
                PathMetrics {
                    path: entry.key().clone(),
                    count: timing.count,
                    avg_time_ms: timing.average_ms(),
                    min_time_ms: as_millis(timing.min),
                    max_time_ms: as_millis(timing.max),
                    total_time_s: timing.total.as_secs_f64(),
                }
            })
            .collect();
        metrics.sort_by(|a, b| a.path.cmp(&b.path));
        metrics
    }
}

// Microsecond precision, as milliseconds.
fn as_millis(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}
