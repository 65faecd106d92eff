// src/persistence.rs
//
// Incident sink. Finalized incidents are appended as JSON lines, one file
// per day, for the downstream analytics collaborator to consume.
// Submissions are idempotent on incident_id so the dispatcher can retry
// without duplicating records.

use crate::incident::Incident;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Serialize)]
struct PersistedIncident<'a> {
    #[serde(flatten)]
    incident: &'a Incident,
    image_path: Option<&'a str>,
}

pub struct IncidentLog {
    incidents_dir: PathBuf,
    seen_ids: HashSet<String>,
}

impl IncidentLog {
    pub fn new(log_directory: &str) -> Result<Self> {
        let incidents_dir = PathBuf::from(log_directory).join("incidents");
        fs::create_dir_all(&incidents_dir).with_context(|| {
            format!("failed to create incident log directory {:?}", incidents_dir)
        })?;
        info!("Incident log writing to {}", incidents_dir.display());
        Ok(Self {
            incidents_dir,
            seen_ids: HashSet::new(),
        })
    }

    fn current_file(&self) -> PathBuf {
        let date = Utc::now().format("%Y%m%d");
        self.incidents_dir.join(format!("incidents_{}.jsonl", date))
    }

    /// Append one incident. Returns false (without writing) when the same
    /// incident_id was already logged.
    pub fn log_incident(&mut self, incident: &Incident, image_path: Option<&str>) -> Result<bool> {
        if !self.seen_ids.insert(incident.incident_id.clone()) {
            debug!(
                "Incident {} already persisted, skipping",
                incident.incident_id
            );
            return Ok(false);
        }

        let record = PersistedIncident {
            incident,
            image_path,
        };
        let line = serde_json::to_string(&record).context("failed to serialize incident")?;

        let path = self.current_file();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open incident log {:?}", path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("failed to append incident to {:?}", path))?;

        Ok(true)
    }

    pub fn persisted_count(&self) -> usize {
        self.seen_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::ConfirmedObstacle;
    use crate::incident::IncidentReporter;
    use crate::types::{
        BoundingBox, Detection, ObstacleClass, RiskAssessment, Severity, TtcLevel, Zone,
    };

    fn test_incident(reporter: &mut IncidentReporter) -> Incident {
        let obstacle = ConfirmedObstacle {
            track_id: 1,
            detection: Detection {
                class: ObstacleClass::Human,
                confidence: 0.95,
                bbox: BoundingBox::new(200, 200, 250, 400),
            },
            duration_secs: 2.0,
            is_static: false,
            frame_count: 5,
            newly_confirmed: false,
        };
        let assessment = RiskAssessment {
            obstacle_class: ObstacleClass::Human,
            distance_m: 6.8,
            ttc_seconds: 0.41,
            ttc_level: TtcLevel::Critical,
            zone: Zone::Critical,
            risk_score: 100.0,
            risk_level: Severity::Critical,
            is_static: false,
        };
        reporter.generate_report(&obstacle, &assessment, None, 60.0)
    }

    fn temp_log_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!(
            "railtrack_test_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn test_incident_appended_as_json_line() {
        let dir = temp_log_dir("append");
        let mut log = IncidentLog::new(&dir).unwrap();
        let mut reporter = IncidentReporter::new();

        let incident = test_incident(&mut reporter);
        assert!(log.log_incident(&incident, Some("logs/images/frame.jpg")).unwrap());

        let contents = fs::read_to_string(log.current_file()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed["incident_id"], incident.incident_id);
        assert_eq!(parsed["severity"], "critical");
        assert_eq!(parsed["image_path"], "logs/images/frame.jpg");
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let dir = temp_log_dir("idempotent");
        let mut log = IncidentLog::new(&dir).unwrap();
        let mut reporter = IncidentReporter::new();
        let incident = test_incident(&mut reporter);

        assert!(log.log_incident(&incident, None).unwrap());
        assert!(!log.log_incident(&incident, None).unwrap());
        assert_eq!(log.persisted_count(), 1);

        let contents = fs::read_to_string(log.current_file()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_distinct_incidents_both_logged() {
        let dir = temp_log_dir("distinct");
        let mut log = IncidentLog::new(&dir).unwrap();
        let mut reporter = IncidentReporter::new();

        let first = test_incident(&mut reporter);
        let second = test_incident(&mut reporter);
        assert_ne!(first.incident_id, second.incident_id);

        assert!(log.log_incident(&first, None).unwrap());
        assert!(log.log_incident(&second, None).unwrap());
        assert_eq!(log.persisted_count(), 2);
    }
}
