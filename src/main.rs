// src/main.rs

mod alerts;
mod config;
mod confirmation;
mod distance;
mod false_alert;
mod incident;
mod persistence;
mod pipeline;
mod risk;
mod severity;
mod tracker;
mod types;
mod zones;

use alerts::AlertManager;
use anyhow::Result;
use persistence::IncidentLog;
use pipeline::{spawn_dispatcher, PipelineEvent, PipelineMetrics, RailTrackPipeline};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use types::{Config, FrameRecord};
use walkdir::WalkDir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("railtrack=info")),
        )
        .init();

    info!("🚆 RailTrack obstacle detection pipeline starting");

    let config = Config::load_or_default("config.yaml");
    info!("✓ Configuration loaded");
    info!(
        "Distance model: focal={}px, train speed={}km/h, TTC bands={}/{}/{}s",
        config.distance.focal_length,
        config.distance.train_speed_kmh,
        config.distance.ttc_critical,
        config.distance.ttc_high,
        config.distance.ttc_medium
    );
    info!(
        "Confirmation: {} frames, max gap {}, movement threshold {}px",
        config.confirmation.min_consecutive_frames,
        config.confirmation.max_frame_gap,
        config.confirmation.movement_threshold
    );

    let metrics = PipelineMetrics::new();

    let alert_manager = AlertManager::new(config.alerts.clone());
    let incident_log = IncidentLog::new(&config.persistence.log_directory)?;
    let (dispatch, dispatcher_handle) =
        spawn_dispatcher(alert_manager, incident_log, metrics.clone());
    info!("✓ Alert/persistence dispatcher ready");

    let mut railtrack = RailTrackPipeline::new(config.clone(), dispatch, metrics.clone());
    railtrack.initialize_zones(config.video.source_width, config.video.source_height);

    let streams = find_detection_streams(&config.video.input_dir)?;
    if streams.is_empty() {
        error!("No detection streams found in {}", config.video.input_dir);
        return Ok(());
    }

    for path in &streams {
        if let Err(e) = process_stream(&mut railtrack, path) {
            error!("Stream {} aborted: {e:#}", path.display());
        }
    }

    print_report(&metrics);

    // Dropping the pipeline closes the dispatch channel; awaiting the worker
    // guarantees every queued incident reached alerting and persistence.
    drop(railtrack);
    let _ = dispatcher_handle.await;
    info!("✅ Shutdown complete");

    Ok(())
}

fn find_detection_streams(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut streams = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
            streams.push(path.to_path_buf());
        }
    }

    streams.sort();
    info!("Found {} detection streams", streams.len());
    Ok(streams)
}

fn process_stream(railtrack: &mut RailTrackPipeline, path: &Path) -> Result<()> {
    info!("Processing detection stream: {}", path.display());
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: FrameRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "{}:{}: skipping unparseable frame record: {}",
                    path.display(),
                    line_no + 1,
                    e
                );
                continue;
            }
        };

        match railtrack.process_frame(record.frame, &record.detections, Instant::now()) {
            Ok(report) => {
                if !report.incidents.is_empty() {
                    info!(
                        "Frame {}: {} incident(s) from {} confirmed obstacle(s)",
                        report.frame_id,
                        report.incidents.len(),
                        report.confirmed
                    );
                }
            }
            Err(e) => {
                // The frame is skipped; tracker state is intact for the next one.
                error!("Frame {} failed: {e:#}", record.frame);
            }
        }

        for event in railtrack.drain_events() {
            log_event(&event);
        }
    }

    Ok(())
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::ObstacleConfirmed {
            track_id,
            class,
            is_static,
        } => {
            info!(
                "Obstacle confirmed: track {} ({}, static={})",
                track_id,
                class.as_str(),
                is_static
            );
        }
        PipelineEvent::IncidentRaised {
            incident_id,
            severity,
            class,
            zone,
            ttc_seconds,
        } => {
            info!(
                "🚨 Incident {}: {} {} in {} zone (ttc={})",
                incident_id,
                severity.as_str().to_uppercase(),
                class.as_str(),
                zone.as_str(),
                ttc_seconds
                    .map(|t| format!("{:.1}s", t))
                    .unwrap_or_else(|| "∞".to_string())
            );
        }
        PipelineEvent::DuplicateSuppressed { track_id, class } => {
            debug!(
                "Duplicate alert suppressed for track {} ({})",
                track_id,
                class.as_str()
            );
        }
    }
}

fn print_report(metrics: &PipelineMetrics) {
    let summary = metrics.summary();
    info!("{}", "=".repeat(60));
    info!("📊 RAILTRACK SYSTEM REPORT");
    info!("{}", "=".repeat(60));
    info!("Runtime: {:.1} seconds", summary.elapsed_secs);
    info!("Average FPS: {:.1}", summary.fps);
    info!("Frames processed: {}", summary.frames_processed);
    info!(
        "Detections: {} ({} malformed dropped)",
        summary.detections_total, summary.malformed_dropped
    );
    info!("Confirmed obstacle sightings: {}", summary.confirmed_obstacles);
    info!(
        "Suppressed: {} implausible, {} duplicates",
        summary.filter_suppressed, summary.duplicates_suppressed
    );
    info!(
        "Incidents: {} total ({} critical, {} high)",
        summary.incidents_total, summary.incidents_critical, summary.incidents_high
    );
    info!(
        "Alerts: {} delivered, {} failed, {} persistence failures",
        summary.alerts_delivered, summary.alerts_failed, summary.persist_failures
    );
    info!("{}", "=".repeat(60));
}
