// src/confirmation.rs
//
// Multi-frame confirmation. A track only becomes a reportable obstacle
// after sustained, gap-tolerant appearance; single-frame detector noise
// never reaches the alerting chain.
//
// History cleanup here is wall-clock based and intentionally independent
// of the tracker's frame-count deregistration: a track can drop out of the
// tracker while its history lingers until the inactivity timeout, and
// vice versa.

use crate::tracker::Track;
use crate::types::{ConfirmationConfig, Detection};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct HistoryEntry {
    detection: Detection,
    frame: u64,
}

/// Per-track detection history. One entry per track id, created only when
/// the tracker actually reports that id.
#[derive(Debug, Clone)]
struct ObstacleHistory {
    detections: VecDeque<HistoryEntry>,
    first_seen: Instant,
    last_seen: Instant,
    confirmed: bool,
    positions: VecDeque<(f64, f64)>,
    is_static: bool,
}

/// A track that has passed the confirmation gate this frame.
#[derive(Debug, Clone)]
pub struct ConfirmedObstacle {
    pub track_id: u64,
    pub detection: Detection,
    /// Seconds since the track was first seen.
    pub duration_secs: f64,
    pub is_static: bool,
    /// Entries currently held in the bounded history window.
    pub frame_count: usize,
    /// True only on the frame the sticky confirmed flag was first set.
    pub newly_confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct ObstacleInfo {
    pub track_id: u64,
    pub duration_secs: f64,
    pub detection_count: usize,
    pub confirmed: bool,
    pub is_static: bool,
    pub positions: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct ConfirmationStats {
    pub frame_count: u64,
    pub total_tracked: usize,
    pub total_confirmed: usize,
    pub confirmation_rate: f64,
    pub static_obstacles: usize,
}

const POSITION_WINDOW: usize = 10;

pub struct MultiFrameConfirmation {
    config: ConfirmationConfig,
    history: HashMap<u64, ObstacleHistory>,
    confirmed_obstacles: HashMap<u64, Detection>,
    frame_count: u64,
}

impl MultiFrameConfirmation {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
            confirmed_obstacles: HashMap::new(),
            frame_count: 0,
        }
    }

    fn window_capacity(&self) -> usize {
        self.config.min_consecutive_frames + self.config.max_frame_gap as usize
    }

    /// Feed one frame of tracked objects. Returns the obstacles whose
    /// recent history passes the confirmation gate this frame.
    pub fn update(
        &mut self,
        tracked: &BTreeMap<u64, Track>,
        now: Instant,
    ) -> Vec<ConfirmedObstacle> {
        self.frame_count += 1;
        let frame = self.frame_count;
        let capacity = self.window_capacity();

        let mut confirmed = Vec::new();

        for (&id, track) in tracked {
            let history = self.history.entry(id).or_insert_with(|| ObstacleHistory {
                detections: VecDeque::with_capacity(capacity),
                first_seen: now,
                last_seen: now,
                confirmed: false,
                positions: VecDeque::with_capacity(POSITION_WINDOW),
                is_static: false,
            });

            if history.detections.len() == capacity {
                history.detections.pop_front();
            }
            history.detections.push_back(HistoryEntry {
                detection: track.detection,
                frame,
            });
            history.last_seen = now;

            if history.positions.len() == POSITION_WINDOW {
                history.positions.pop_front();
            }
            history.positions.push_back(track.detection.bbox.center());

            if history.positions.len() >= 3 {
                history.is_static =
                    is_static(history.positions.make_contiguous(), self.config.movement_threshold);
            }

            if passes_gap_test(
                &history.detections,
                self.config.min_consecutive_frames,
                self.config.max_frame_gap,
            ) {
                let newly_confirmed = !history.confirmed;
                if newly_confirmed {
                    history.confirmed = true;
                    self.confirmed_obstacles.insert(id, track.detection);
                    info!(
                        "✅ Track {} confirmed after {} frames (static={})",
                        id,
                        history.detections.len(),
                        history.is_static
                    );
                }

                confirmed.push(ConfirmedObstacle {
                    track_id: id,
                    detection: track.detection,
                    duration_secs: now.duration_since(history.first_seen).as_secs_f64(),
                    is_static: history.is_static,
                    frame_count: history.detections.len(),
                    newly_confirmed,
                });
            }
        }

        self.cleanup(now);

        confirmed
    }

    /// Purge history entries not seen within the inactivity timeout.
    fn cleanup(&mut self, now: Instant) {
        let timeout = self.config.timeout_secs;
        let mut stale = Vec::new();
        for (&id, history) in &self.history {
            if now.duration_since(history.last_seen).as_secs_f64() > timeout {
                stale.push(id);
            }
        }
        for id in stale {
            debug!("Track {} history purged after inactivity", id);
            self.history.remove(&id);
            self.confirmed_obstacles.remove(&id);
        }
    }

    pub fn obstacle_info(&self, track_id: u64) -> Option<ObstacleInfo> {
        self.history.get(&track_id).map(|h| ObstacleInfo {
            track_id,
            duration_secs: h.last_seen.duration_since(h.first_seen).as_secs_f64(),
            detection_count: h.detections.len(),
            confirmed: h.confirmed,
            is_static: h.is_static,
            positions: h.positions.iter().copied().collect(),
        })
    }

    /// Tracks holding the sticky confirmed flag, regardless of whether they
    /// passed the gap test this frame.
    pub fn all_confirmed(&self) -> Vec<(u64, Detection)> {
        let mut all: Vec<(u64, Detection)> = self
            .confirmed_obstacles
            .iter()
            .map(|(&id, det)| (id, *det))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn stats(&self) -> ConfirmationStats {
        let total_tracked = self.history.len();
        let total_confirmed = self.confirmed_obstacles.len();
        ConfirmationStats {
            frame_count: self.frame_count,
            total_tracked,
            total_confirmed,
            confirmation_rate: if total_tracked > 0 {
                total_confirmed as f64 / total_tracked as f64
            } else {
                0.0
            },
            static_obstacles: self.history.values().filter(|h| h.is_static).count(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.confirmed_obstacles.clear();
        self.frame_count = 0;
    }
}

/// Confirmation gate: at least min_consecutive entries, and every gap
/// between the frame indices of the most recent min_consecutive entries is
/// within max_frame_gap (gap = frame difference - 1, so 0 means strictly
/// consecutive frames).
fn passes_gap_test(
    detections: &VecDeque<HistoryEntry>,
    min_consecutive: usize,
    max_frame_gap: u64,
) -> bool {
    if detections.len() < min_consecutive {
        return false;
    }
    let recent: Vec<u64> = detections
        .iter()
        .skip(detections.len() - min_consecutive)
        .map(|e| e.frame)
        .collect();
    recent
        .windows(2)
        .all(|pair| pair[1] - pair[0] - 1 <= max_frame_gap)
}

/// Stationary iff the maximum displacement between consecutive observed
/// positions stays under the movement threshold.
fn is_static(positions: &[(f64, f64)], movement_threshold: f64) -> bool {
    if positions.len() < 2 {
        return true;
    }
    let max_displacement = positions
        .windows(2)
        .map(|p| {
            let (x1, y1) = p[0];
            let (x2, y2) = p[1];
            ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
        })
        .fold(0.0_f64, f64::max);
    max_displacement < movement_threshold
}
