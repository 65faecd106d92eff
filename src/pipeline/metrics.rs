// src/pipeline/metrics.rs
//
// Pipeline observability. Counters for every stage of the decision chain,
// shared with the dispatch worker via atomics. Export via logs or the
// end-of-run report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_processed: Arc<AtomicU64>,
    pub detections_total: Arc<AtomicU64>,
    pub malformed_dropped: Arc<AtomicU64>,
    pub confirmed_obstacles: Arc<AtomicU64>,
    pub filter_suppressed: Arc<AtomicU64>,
    pub duplicates_suppressed: Arc<AtomicU64>,
    pub incidents_total: Arc<AtomicU64>,
    pub incidents_critical: Arc<AtomicU64>,
    pub incidents_high: Arc<AtomicU64>,
    pub alerts_delivered: Arc<AtomicU64>,
    pub alerts_failed: Arc<AtomicU64>,
    pub persist_failures: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            detections_total: Arc::new(AtomicU64::new(0)),
            malformed_dropped: Arc::new(AtomicU64::new(0)),
            confirmed_obstacles: Arc::new(AtomicU64::new(0)),
            filter_suppressed: Arc::new(AtomicU64::new(0)),
            duplicates_suppressed: Arc::new(AtomicU64::new(0)),
            incidents_total: Arc::new(AtomicU64::new(0)),
            incidents_critical: Arc::new(AtomicU64::new(0)),
            incidents_high: Arc::new(AtomicU64::new(0)),
            alerts_delivered: Arc::new(AtomicU64::new(0)),
            alerts_failed: Arc::new(AtomicU64::new(0)),
            persist_failures: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            fps: self.fps(),
            detections_total: self.detections_total.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            confirmed_obstacles: self.confirmed_obstacles.load(Ordering::Relaxed),
            filter_suppressed: self.filter_suppressed.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            incidents_total: self.incidents_total.load(Ordering::Relaxed),
            incidents_critical: self.incidents_critical.load(Ordering::Relaxed),
            incidents_high: self.incidents_high.load(Ordering::Relaxed),
            alerts_delivered: self.alerts_delivered.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_processed: u64,
    pub fps: f64,
    pub detections_total: u64,
    pub malformed_dropped: u64,
    pub confirmed_obstacles: u64,
    pub filter_suppressed: u64,
    pub duplicates_suppressed: u64,
    pub incidents_total: u64,
    pub incidents_critical: u64,
    pub incidents_high: u64,
    pub alerts_delivered: u64,
    pub alerts_failed: u64,
    pub persist_failures: u64,
    pub elapsed_secs: f64,
}
