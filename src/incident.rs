// src/incident.rs
//
// Incident record assembly. Takes a confirmed, zone-classified, risk-scored
// obstacle and produces the immutable record handed to alerting and
// persistence, including a human-readable explanation built clause by
// clause.

use crate::confirmation::ConfirmedObstacle;
use crate::severity::{IncidentFacts, SeverityClassifier};
use crate::types::{BoundingBox, GpsFix, ObstacleClass, RiskAssessment, Severity, Zone};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct ObstacleSummary {
    #[serde(rename = "type")]
    pub class: ObstacleClass,
    pub confidence: f32,
    pub is_static: bool,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentLocation {
    pub zone: Zone,
    pub bbox: BoundingBox,
    pub gps: Option<GpsFix>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentRisk {
    /// None when the estimate degenerated to infinity.
    pub distance_meters: Option<f64>,
    pub ttc_seconds: Option<f64>,
    pub train_speed_kmh: f64,
    pub risk_score: f64,
}

/// A finalized incident. Immutable after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub severity_priority: u8,
    pub obstacle: ObstacleSummary,
    pub location: IncidentLocation,
    pub risk_assessment: IncidentRisk,
    pub recommended_action: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub total_incidents: usize,
    pub by_severity: HashMap<Severity, usize>,
    pub by_type: HashMap<ObstacleClass, usize>,
    /// Worst-first, capped at five.
    pub critical_incidents: Vec<Incident>,
}

pub struct IncidentReporter {
    classifier: SeverityClassifier,
    last_stamp: String,
    seq: u32,
}

impl IncidentReporter {
    pub fn new() -> Self {
        Self {
            classifier: SeverityClassifier::new(),
            last_stamp: String::new(),
            seq: 0,
        }
    }

    /// Time-derived unique id. Two incidents in the same microsecond (same
    /// frame, typically) get a sequence suffix.
    fn next_incident_id(&mut self, now: DateTime<Utc>) -> String {
        let stamp = now.format("%Y%m%d%H%M%S%6f").to_string();
        if stamp == self.last_stamp {
            self.seq += 1;
            format!("INC_{}_{}", stamp, self.seq)
        } else {
            self.last_stamp = stamp;
            self.seq = 0;
            format!("INC_{}", self.last_stamp)
        }
    }

    pub fn generate_report(
        &mut self,
        obstacle: &ConfirmedObstacle,
        assessment: &RiskAssessment,
        gps: Option<GpsFix>,
        train_speed_kmh: f64,
    ) -> Incident {
        let facts = IncidentFacts {
            obstacle_class: assessment.obstacle_class,
            zone: assessment.zone,
            ttc: assessment.ttc_seconds,
            is_static: assessment.is_static,
        };
        let severity = self.classifier.classify(&facts);
        let now = Utc::now();

        Incident {
            incident_id: self.next_incident_id(now),
            timestamp: now,
            severity,
            severity_priority: severity.priority(),
            obstacle: ObstacleSummary {
                class: assessment.obstacle_class,
                confidence: obstacle.detection.confidence,
                is_static: assessment.is_static,
                duration_seconds: obstacle.duration_secs,
            },
            location: IncidentLocation {
                zone: assessment.zone,
                bbox: obstacle.detection.bbox,
                gps,
            },
            risk_assessment: IncidentRisk {
                distance_meters: finite(assessment.distance_m),
                ttc_seconds: finite(assessment.ttc_seconds),
                train_speed_kmh,
                risk_score: assessment.risk_score,
            },
            recommended_action: self.classifier.recommended_action(severity).to_string(),
            explanation: explanation(
                assessment,
                obstacle.duration_secs,
                severity,
            ),
        }
    }

    /// Aggregate view over a set of finalized incidents.
    pub fn summary_report(&self, incidents: &[Incident]) -> SummaryReport {
        let mut by_severity: HashMap<Severity, usize> = HashMap::new();
        let mut by_type: HashMap<ObstacleClass, usize> = HashMap::new();
        for incident in incidents {
            *by_severity.entry(incident.severity).or_insert(0) += 1;
            *by_type.entry(incident.obstacle.class).or_insert(0) += 1;
        }

        let mut critical: Vec<Incident> = incidents
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .cloned()
            .collect();
        critical.sort_by(|a, b| b.severity_priority.cmp(&a.severity_priority));
        critical.truncate(5);

        SummaryReport {
            total_incidents: incidents.len(),
            by_severity,
            by_type,
            critical_incidents: critical,
        }
    }
}

impl Default for IncidentReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Sentence-per-clause explanation, joined with ". " and closed with ".".
fn explanation(assessment: &RiskAssessment, duration_secs: f64, severity: Severity) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(
        match assessment.obstacle_class {
            ObstacleClass::Human => "A human was detected",
            ObstacleClass::Vehicle => "A vehicle was detected",
            ObstacleClass::Animal => "An animal was detected",
            ObstacleClass::Debris => "Debris was detected",
        }
        .to_string(),
    );

    parts.push(
        match assessment.zone {
            Zone::Critical => "on the railway track",
            Zone::Warning => "near the railway track",
            Zone::Safe => "in the vicinity",
        }
        .to_string(),
    );

    if assessment.distance_m.is_finite() {
        parts.push(format!(
            "at approximately {:.1} meters ahead",
            assessment.distance_m
        ));
    }

    if assessment.is_static {
        parts.push(format!(
            "The obstacle remained stationary for {:.1} seconds",
            duration_secs
        ));
    }

    if assessment.ttc_seconds < 60.0 {
        parts.push(format!(
            "Estimated collision time: {:.1} seconds",
            assessment.ttc_seconds
        ));
    }

    parts.push(format!(
        "Severity classified as {}",
        severity.as_str().to_uppercase()
    ));

    parts.join(". ") + "."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detection, TtcLevel};

    fn confirmed(class: ObstacleClass, is_static: bool, duration: f64) -> ConfirmedObstacle {
        ConfirmedObstacle {
            track_id: 1,
            detection: Detection {
                class,
                confidence: 0.95,
                bbox: BoundingBox::new(200, 200, 250, 400),
            },
            duration_secs: duration,
            is_static,
            frame_count: 5,
            newly_confirmed: false,
        }
    }

    fn assessment(
        class: ObstacleClass,
        zone: Zone,
        distance: f64,
        ttc: f64,
        is_static: bool,
    ) -> RiskAssessment {
        RiskAssessment {
            obstacle_class: class,
            distance_m: distance,
            ttc_seconds: ttc,
            ttc_level: TtcLevel::Critical,
            zone,
            risk_score: 90.0,
            risk_level: Severity::Critical,
            is_static,
        }
    }

    #[test]
    fn test_report_for_human_on_track() {
        let mut reporter = IncidentReporter::new();
        let incident = reporter.generate_report(
            &confirmed(ObstacleClass::Human, true, 12.0),
            &assessment(ObstacleClass::Human, Zone::Critical, 200.0, 12.0, true),
            None,
            60.0,
        );

        assert_eq!(incident.severity, Severity::Critical);
        assert_eq!(incident.severity_priority, 4);
        assert!(incident.incident_id.starts_with("INC_"));
        assert_eq!(incident.risk_assessment.distance_meters, Some(200.0));
        assert_eq!(
            incident.explanation,
            "A human was detected. on the railway track. at approximately 200.0 meters ahead. \
             The obstacle remained stationary for 12.0 seconds. \
             Estimated collision time: 12.0 seconds. Severity classified as CRITICAL."
        );
    }

    #[test]
    fn test_explanation_omits_optional_clauses() {
        let mut reporter = IncidentReporter::new();
        let incident = reporter.generate_report(
            &confirmed(ObstacleClass::Animal, false, 3.0),
            &assessment(
                ObstacleClass::Animal,
                Zone::Warning,
                f64::INFINITY,
                f64::INFINITY,
                false,
            ),
            None,
            60.0,
        );

        assert_eq!(incident.risk_assessment.distance_meters, None);
        assert_eq!(incident.risk_assessment.ttc_seconds, None);
        assert_eq!(
            incident.explanation,
            "An animal was detected. near the railway track. Severity classified as MEDIUM."
        );
    }

    #[test]
    fn test_incident_ids_unique_within_a_burst() {
        let mut reporter = IncidentReporter::new();
        let obstacle = confirmed(ObstacleClass::Human, false, 1.0);
        let risk = assessment(ObstacleClass::Human, Zone::Critical, 100.0, 15.0, false);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let incident = reporter.generate_report(&obstacle, &risk, None, 60.0);
            assert!(seen.insert(incident.incident_id.clone()), "duplicate id");
        }
    }

    #[test]
    fn test_incident_serializes_to_json() {
        let mut reporter = IncidentReporter::new();
        let incident = reporter.generate_report(
            &confirmed(ObstacleClass::Vehicle, false, 2.0),
            &assessment(ObstacleClass::Vehicle, Zone::Critical, 50.0, 3.0, false),
            Some(GpsFix {
                latitude: 28.6139,
                longitude: 77.2090,
            }),
            60.0,
        );

        let json = serde_json::to_value(&incident).unwrap();
        assert_eq!(json["obstacle"]["type"], "vehicle");
        assert_eq!(json["location"]["zone"], "critical");
        assert_eq!(json["location"]["gps"]["latitude"], 28.6139);
    }

    #[test]
    fn test_summary_report_counts_and_caps_critical() {
        let mut reporter = IncidentReporter::new();
        let obstacle = confirmed(ObstacleClass::Human, false, 1.0);
        let critical_risk = assessment(ObstacleClass::Human, Zone::Critical, 100.0, 15.0, false);
        let low_risk = assessment(ObstacleClass::Debris, Zone::Safe, 500.0, 90.0, false);

        let mut incidents = Vec::new();
        for _ in 0..7 {
            incidents.push(reporter.generate_report(&obstacle, &critical_risk, None, 60.0));
        }
        incidents.push(reporter.generate_report(
            &confirmed(ObstacleClass::Debris, false, 1.0),
            &low_risk,
            None,
            60.0,
        ));

        let summary = reporter.summary_report(&incidents);
        assert_eq!(summary.total_incidents, 8);
        assert_eq!(summary.by_severity[&Severity::Critical], 7);
        assert_eq!(summary.by_type[&ObstacleClass::Human], 7);
        assert_eq!(summary.critical_incidents.len(), 5);
    }
}
