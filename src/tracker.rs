// src/tracker.rs
//
// Nearest-centroid multi-object tracker. Assigns stable identities to
// per-frame detections so the confirmation layer can accumulate history
// per physical obstacle.
//
// Design:
//   - Greedy per-detection matching against the frame-start track set
//     (sufficient for the tens of objects a right-of-way camera sees)
//   - Fixed pixel gate: a detection farther than max_distance from every
//     unmatched track becomes a new track
//   - Tracks coast through missed frames up to max_disappeared, then are
//     deregistered; ids are never reused

use crate::types::{centroid_distance, Detection, TrackerConfig};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A tracked obstacle identity. Owned exclusively by the tracker.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u64,
    pub detection: Detection,
    pub disappeared: u32,
}

pub struct ObstacleTracker {
    config: TrackerConfig,
    /// Keyed by id; ids increase monotonically, so ascending-key iteration
    /// is registration order. Equal-distance ties go to the oldest track.
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
}

impl ObstacleTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn register(&mut self, detection: Detection) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "🆕 Track {} registered: class={}, bbox=[{},{},{},{}]",
            id,
            detection.class.as_str(),
            detection.bbox.x1,
            detection.bbox.y1,
            detection.bbox.x2,
            detection.bbox.y2
        );
        self.tracks.insert(
            id,
            Track {
                id,
                detection,
                disappeared: 0,
            },
        );
        id
    }

    fn deregister(&mut self, id: u64) {
        self.tracks.remove(&id);
        info!("🗑️  Track {} deregistered", id);
    }

    /// Process one frame of detections and return the live track table.
    pub fn update(&mut self, detections: &[Detection]) -> &BTreeMap<u64, Track> {
        // No detections: everything coasts, stale tracks drop out.
        if detections.is_empty() {
            let ids: Vec<u64> = self.tracks.keys().copied().collect();
            for id in ids {
                let stale = {
                    let track = self.tracks.get_mut(&id).expect("id from live key set");
                    track.disappeared += 1;
                    track.disappeared > self.config.max_disappeared
                };
                if stale {
                    self.deregister(id);
                }
            }
            return &self.tracks;
        }

        // First frame with no existing tracks: every detection is new.
        if self.tracks.is_empty() {
            for det in detections {
                self.register(*det);
            }
            return &self.tracks;
        }

        // Greedy nearest-centroid assignment against the frame-start
        // candidate set. Tracks registered during this loop are not
        // candidates for later detections in the same frame.
        let mut unmatched: Vec<u64> = self.tracks.keys().copied().collect();

        for det in detections {
            let mut best: Option<(u64, f64)> = None;
            for &id in &unmatched {
                let dist = centroid_distance(&det.bbox, &self.tracks[&id].detection.bbox);
                // Strict < keeps the first-registered track on equal distances.
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((id, dist));
                }
            }

            match best {
                Some((id, dist)) if dist < self.config.max_distance => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.detection = *det;
                        track.disappeared = 0;
                    }
                    unmatched.retain(|&u| u != id);
                }
                _ => {
                    self.register(*det);
                }
            }
        }

        // Tracks that got nothing this frame coast toward deregistration.
        for id in unmatched {
            let stale = {
                let track = self.tracks.get_mut(&id).expect("id from live key set");
                track.disappeared += 1;
                track.disappeared > self.config.max_disappeared
            };
            if stale {
                self.deregister(id);
            }
        }

        &self.tracks
    }

    pub fn tracks(&self) -> &BTreeMap<u64, Track> {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}
