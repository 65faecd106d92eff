// src/pipeline/orchestrator.rs
//
// Per-frame wiring of the decision chain:
//   detections → tracker → confirmation → false-alert filter →
//   zone / risk / severity per obstacle → duplicate gate → incident →
//   hand-off to the alert/persistence worker.
//
// Frame processing is synchronous and single-threaded; the only off-thread
// work is the dispatch worker, which receives incidents in generation order
// over an unbounded channel so the frame loop never blocks on collaborators.

use crate::alerts::AlertManager;
use crate::confirmation::MultiFrameConfirmation;
use crate::false_alert::{DuplicateAlertFilter, FalseAlertFilter};
use crate::incident::{Incident, IncidentReporter};
use crate::persistence::IncidentLog;
use crate::pipeline::event_bus::{EventBus, PipelineEvent};
use crate::pipeline::metrics::PipelineMetrics;
use crate::risk::CollisionRiskAssessor;
use crate::severity::{IncidentFacts, SeverityClassifier};
use crate::tracker::ObstacleTracker;
use crate::types::{Config, Detection, Severity};
use crate::zones::TrackZones;
use crate::distance::DistanceEstimator;
use anyhow::{bail, Result};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, warn};

const EVENT_BUS_CAPACITY: usize = 256;

/// Everything that happened on one frame, for the caller.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_id: u64,
    pub detections: usize,
    pub tracked: usize,
    pub confirmed: usize,
    pub filtered: usize,
    pub incidents: Vec<Incident>,
}

pub struct RailTrackPipeline {
    config: Config,
    tracker: ObstacleTracker,
    confirmation: MultiFrameConfirmation,
    false_alerts: FalseAlertFilter,
    duplicates: DuplicateAlertFilter,
    zones: TrackZones,
    risk: CollisionRiskAssessor,
    severity: SeverityClassifier,
    reporter: IncidentReporter,
    events: EventBus,
    metrics: PipelineMetrics,
    dispatch: mpsc::UnboundedSender<Incident>,
}

impl RailTrackPipeline {
    pub fn new(
        config: Config,
        dispatch: mpsc::UnboundedSender<Incident>,
        metrics: PipelineMetrics,
    ) -> Self {
        let mut distance_estimator = DistanceEstimator::new(config.distance.clone());
        if let Some(cal) = &config.distance.calibration {
            distance_estimator.calibrate_focal_length(
                cal.known_distance,
                cal.known_height,
                cal.pixel_height,
            );
        }

        Self {
            tracker: ObstacleTracker::new(config.tracker.clone()),
            confirmation: MultiFrameConfirmation::new(config.confirmation.clone()),
            false_alerts: FalseAlertFilter::new(config.filter.clone()),
            duplicates: DuplicateAlertFilter::new(config.filter.clone()),
            zones: TrackZones::new(config.track.clone()),
            risk: CollisionRiskAssessor::new(distance_estimator),
            severity: SeverityClassifier::new(),
            reporter: IncidentReporter::new(),
            events: EventBus::new(EVENT_BUS_CAPACITY),
            metrics,
            dispatch,
            config,
        }
    }

    /// Bind the zone model to the stream's frame dimensions. Must be called
    /// before the first frame, and again if the resolution changes.
    pub fn initialize_zones(&mut self, width: u32, height: u32) {
        self.zones.initialize(width, height);
    }

    /// Run one frame through the full chain. Fails fast (state untouched)
    /// when the zone model has no dimensions yet.
    pub fn process_frame(
        &mut self,
        frame_id: u64,
        detections: &[Detection],
        now: Instant,
    ) -> Result<FrameReport> {
        if !self.zones.is_initialized() {
            bail!("frame {} rejected: zone model not initialised", frame_id);
        }

        self.metrics.inc(&self.metrics.frames_processed);

        // Malformed input never reaches the tracker.
        let valid: Vec<Detection> = detections
            .iter()
            .filter(|det| {
                if det.bbox.is_valid() {
                    true
                } else {
                    warn!(
                        "Frame {}: dropping degenerate bbox [{},{},{},{}]",
                        frame_id, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
                    );
                    self.metrics.inc(&self.metrics.malformed_dropped);
                    false
                }
            })
            .copied()
            .collect();
        self.metrics.add(&self.metrics.detections_total, valid.len() as u64);

        let tracked = self.tracker.update(&valid);
        let tracked_count = tracked.len();

        let confirmed = self.confirmation.update(tracked, now);
        let confirmed_count = confirmed.len();
        self.metrics
            .add(&self.metrics.confirmed_obstacles, confirmed_count as u64);

        for obstacle in &confirmed {
            if obstacle.newly_confirmed {
                self.events.publish(PipelineEvent::ObstacleConfirmed {
                    track_id: obstacle.track_id,
                    class: obstacle.detection.class,
                    is_static: obstacle.is_static,
                });
            }
        }

        let suppressed_before = self.false_alerts.suppressed_count();
        let filtered = self.false_alerts.filter(confirmed);
        self.metrics.add(
            &self.metrics.filter_suppressed,
            self.false_alerts.suppressed_count() - suppressed_before,
        );

        let mut incidents = Vec::new();

        for obstacle in &filtered {
            let zone = self.zones.classify(&obstacle.detection.bbox)?;
            let assessment = self
                .risk
                .assess_risk(&obstacle.detection, zone, obstacle.is_static);

            let severity = self.severity.classify(&IncidentFacts {
                obstacle_class: assessment.obstacle_class,
                zone: assessment.zone,
                ttc: assessment.ttc_seconds,
                is_static: assessment.is_static,
            });

            if severity.priority() < Severity::Medium.priority() {
                continue;
            }

            if self
                .duplicates
                .is_duplicate(obstacle.detection.class, obstacle.detection.bbox, now)
            {
                self.metrics.inc(&self.metrics.duplicates_suppressed);
                self.events.publish(PipelineEvent::DuplicateSuppressed {
                    track_id: obstacle.track_id,
                    class: obstacle.detection.class,
                });
                continue;
            }

            let incident = self.reporter.generate_report(
                obstacle,
                &assessment,
                None,
                self.config.distance.train_speed_kmh,
            );

            self.metrics.inc(&self.metrics.incidents_total);
            match incident.severity {
                Severity::Critical => self.metrics.inc(&self.metrics.incidents_critical),
                Severity::High => self.metrics.inc(&self.metrics.incidents_high),
                _ => {}
            }

            self.events.publish(PipelineEvent::IncidentRaised {
                incident_id: incident.incident_id.clone(),
                severity: incident.severity,
                class: incident.obstacle.class,
                zone: incident.location.zone,
                ttc_seconds: incident.risk_assessment.ttc_seconds,
            });

            // Fire-and-forget: the worker owns delivery and persistence.
            if self.dispatch.send(incident.clone()).is_err() {
                warn!(
                    "Dispatch worker gone, incident {} not submitted",
                    incident.incident_id
                );
            }

            incidents.push(incident);
        }

        Ok(FrameReport {
            frame_id,
            detections: valid.len(),
            tracked: tracked_count,
            confirmed: confirmed_count,
            filtered: filtered.len(),
            incidents,
        })
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.events.drain()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}

/// Start the alert/persistence worker. Incidents arrive in generation order
/// and are processed sequentially; collaborator failures are logged and
/// counted, never propagated back into the frame loop. The worker exits
/// once every sender is dropped, so awaiting the handle drains the queue.
pub fn spawn_dispatcher(
    mut alerts: AlertManager,
    mut incident_log: IncidentLog,
    metrics: PipelineMetrics,
) -> (mpsc::UnboundedSender<Incident>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Incident>();

    let handle = tokio::spawn(async move {
        while let Some(incident) = rx.recv().await {
            let report = alerts.send_alert(&incident).await;
            if report.fully_delivered {
                metrics.inc(&metrics.alerts_delivered);
            } else {
                metrics.inc(&metrics.alerts_failed);
            }

            if let Err(e) = incident_log.log_incident(&incident, None) {
                error!(
                    "Failed to persist incident {}: {e:#}",
                    incident.incident_id
                );
                metrics.inc(&metrics.persist_failures);
            }
        }
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, ObstacleClass};
    use std::time::Duration;

    fn human_on_track() -> Detection {
        // Centered at (640, 500): critical zone at 720p; 200px tall → 6.8m
        Detection {
            class: ObstacleClass::Human,
            confidence: 0.95,
            bbox: BoundingBox::new(600, 400, 680, 600),
        }
    }

    fn pipeline() -> (RailTrackPipeline, mpsc::UnboundedReceiver<Incident>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut pipeline = RailTrackPipeline::new(Config::default(), tx, PipelineMetrics::new());
        pipeline.initialize_zones(1280, 720);
        (pipeline, rx)
    }

    #[test]
    fn test_incident_raised_after_confirmation_window() {
        let (mut pipeline, mut rx) = pipeline();
        let now = Instant::now();
        let dets = vec![human_on_track()];

        // min_consecutive_frames = 5: quiet until the fifth frame
        for i in 0..4u64 {
            let report = pipeline
                .process_frame(i, &dets, now + Duration::from_millis(i * 33))
                .unwrap();
            assert!(report.incidents.is_empty(), "incident on frame {}", i);
        }

        let report = pipeline
            .process_frame(4, &dets, now + Duration::from_millis(132))
            .unwrap();
        assert_eq!(report.incidents.len(), 1);
        let incident = &report.incidents[0];
        assert_eq!(incident.severity, Severity::Critical);
        assert_eq!(incident.obstacle.class, ObstacleClass::Human);

        // Submitted to the dispatch channel in order
        let submitted = rx.try_recv().unwrap();
        assert_eq!(submitted.incident_id, incident.incident_id);
    }

    #[test]
    fn test_repeat_incident_suppressed_as_duplicate() {
        let (mut pipeline, _rx) = pipeline();
        let now = Instant::now();
        let dets = vec![human_on_track()];

        for i in 0..5u64 {
            pipeline
                .process_frame(i, &dets, now + Duration::from_millis(i * 33))
                .unwrap();
        }

        // Next frame: same obstacle, same spot, well inside the window
        let report = pipeline
            .process_frame(5, &dets, now + Duration::from_millis(165))
            .unwrap();
        assert!(report.incidents.is_empty());
        assert_eq!(pipeline.metrics().summary().duplicates_suppressed, 1);
    }

    #[test]
    fn test_degenerate_bbox_dropped_before_tracker() {
        let (mut pipeline, _rx) = pipeline();
        let bad = Detection {
            class: ObstacleClass::Vehicle,
            confidence: 0.8,
            bbox: BoundingBox::new(300, 300, 300, 400),
        };

        let report = pipeline
            .process_frame(0, &[bad], Instant::now())
            .unwrap();
        assert_eq!(report.detections, 0);
        assert_eq!(report.tracked, 0);
        assert_eq!(pipeline.metrics().summary().malformed_dropped, 1);
    }

    #[test]
    fn test_frame_fails_fast_without_zone_dimensions() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pipeline =
            RailTrackPipeline::new(Config::default(), tx, PipelineMetrics::new());

        let result = pipeline.process_frame(0, &[human_on_track()], Instant::now());
        assert!(result.is_err());
        // Nothing was mutated: the failed frame left no tracker state behind
        assert_eq!(pipeline.metrics().summary().frames_processed, 0);

        pipeline.initialize_zones(1280, 720);
        let report = pipeline
            .process_frame(1, &[human_on_track()], Instant::now())
            .unwrap();
        assert_eq!(report.tracked, 1);
    }

    #[test]
    fn test_safe_zone_obstacle_never_raises_incident() {
        let (mut pipeline, mut rx) = pipeline();
        let now = Instant::now();
        // Vehicle far left of the corridor: zone = safe, severity low
        let dets = vec![Detection {
            class: ObstacleClass::Vehicle,
            confidence: 0.9,
            bbox: BoundingBox::new(20, 400, 120, 600),
        }];

        for i in 0..10u64 {
            let report = pipeline
                .process_frame(i, &dets, now + Duration::from_millis(i * 33))
                .unwrap();
            assert!(report.incidents.is_empty());
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_and_persists_queued_incidents() {
        let dir = std::env::temp_dir().join(format!("railtrack_dispatch_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let metrics = PipelineMetrics::new();
        let alerts = AlertManager::new(crate::types::AlertConfig::default());
        let incident_log = IncidentLog::new(dir.to_str().unwrap()).unwrap();
        let (tx, handle) = spawn_dispatcher(alerts, incident_log, metrics.clone());

        // Drive a real pipeline so the dispatched incident is the genuine
        // article, then close the channel and let the worker drain.
        let mut pipeline = RailTrackPipeline::new(Config::default(), tx, PipelineMetrics::new());
        pipeline.initialize_zones(1280, 720);
        let now = Instant::now();
        for i in 0..5u64 {
            pipeline
                .process_frame(i, &[human_on_track()], now + Duration::from_millis(i * 33))
                .unwrap();
        }
        drop(pipeline);
        handle.await.unwrap();

        let summary = metrics.summary();
        assert_eq!(summary.alerts_delivered, 1);
        assert_eq!(summary.alerts_failed, 0);
        assert_eq!(summary.persist_failures, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_confirmation_event_published_once() {
        let (mut pipeline, _rx) = pipeline();
        let now = Instant::now();
        let dets = vec![human_on_track()];

        for i in 0..8u64 {
            pipeline
                .process_frame(i, &dets, now + Duration::from_millis(i * 33))
                .unwrap();
        }

        let confirmations = pipeline
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PipelineEvent::ObstacleConfirmed { .. }))
            .count();
        assert_eq!(confirmations, 1);
    }
}
