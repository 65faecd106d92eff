// src/false_alert.rs
//
// Last line of defense before an obstacle can raise an incident:
// geometry/confidence sanity rules plus time-and-location duplicate
// suppression over a bounded ring of recent alerts.

use crate::confirmation::ConfirmedObstacle;
use crate::types::{centroid_distance, BoundingBox, FilterConfig, ObstacleClass};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

const ALERT_HISTORY_CAPACITY: usize = 100;

pub struct FalseAlertFilter {
    config: FilterConfig,
    suppressed_count: u64,
}

impl FalseAlertFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            suppressed_count: 0,
        }
    }

    /// Drop geometrically implausible or low-confidence obstacles. Each
    /// rule rejects independently.
    pub fn filter(&mut self, obstacles: Vec<ConfirmedObstacle>) -> Vec<ConfirmedObstacle> {
        let mut filtered = Vec::with_capacity(obstacles.len());

        for obstacle in obstacles {
            let bbox = obstacle.detection.bbox;

            if bbox.area() < self.config.min_size {
                debug!(
                    "Track {} rejected: area {} below minimum",
                    obstacle.track_id,
                    bbox.area()
                );
                self.suppressed_count += 1;
                continue;
            }

            if aspect_ratio(&bbox) > self.config.max_aspect_ratio {
                debug!("Track {} rejected: too elongated", obstacle.track_id);
                self.suppressed_count += 1;
                continue;
            }

            if obstacle.detection.class == ObstacleClass::Debris
                && obstacle.detection.confidence < self.config.debris_min_confidence
            {
                debug!(
                    "Track {} rejected: debris at confidence {:.2}",
                    obstacle.track_id, obstacle.detection.confidence
                );
                self.suppressed_count += 1;
                continue;
            }

            filtered.push(obstacle);
        }

        filtered
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed_count
    }
}

/// Longer side over shorter side; degenerate sides yield 0 so the size
/// filter stays the sole authority on them.
fn aspect_ratio(bbox: &BoundingBox) -> f64 {
    let width = bbox.width() as f64;
    let height = bbox.height() as f64;
    let shorter = width.min(height);
    if shorter <= 0.0 {
        return 0.0;
    }
    width.max(height) / shorter
}

#[derive(Debug, Clone)]
struct AlertRecord {
    at: Instant,
    class: ObstacleClass,
    bbox: BoundingBox,
}

/// Suppresses repeat alerts for the same class at the same spot within a
/// time window. Non-duplicates are recorded into a bounded ring.
pub struct DuplicateAlertFilter {
    config: FilterConfig,
    recent: VecDeque<AlertRecord>,
}

impl DuplicateAlertFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            recent: VecDeque::with_capacity(ALERT_HISTORY_CAPACITY),
        }
    }

    /// True if a same-class alert within the distance threshold happened
    /// inside the time window. New alerts are recorded; duplicates are not.
    pub fn is_duplicate(&mut self, class: ObstacleClass, bbox: BoundingBox, now: Instant) -> bool {
        for past in &self.recent {
            if now.duration_since(past.at).as_secs_f64() > self.config.duplicate_window_secs {
                continue;
            }
            if past.class == class
                && centroid_distance(&past.bbox, &bbox) < self.config.duplicate_distance
            {
                return true;
            }
        }

        if self.recent.len() == ALERT_HISTORY_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(AlertRecord {
            at: now,
            class,
            bbox,
        });
        false
    }

    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }
}
