// src/risk.rs
//
// Numeric collision risk synthesis. Combines obstacle class, zone, TTC,
// and motion state into a 0-100 score and a coarse level. Distinct from
// severity: risk feeds dashboards and batch triage, severity drives
// escalation.

use crate::distance::DistanceEstimator;
use crate::types::{Detection, ObstacleClass, RiskAssessment, Severity, Zone};

pub struct CollisionRiskAssessor {
    distance_estimator: DistanceEstimator,
}

#[derive(Debug, Clone)]
pub struct BatchRiskAssessment {
    pub max_risk_level: Severity,
    pub max_risk_score: f64,
    pub obstacle_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub assessments: Vec<RiskAssessment>,
}

impl CollisionRiskAssessor {
    pub fn new(distance_estimator: DistanceEstimator) -> Self {
        Self { distance_estimator }
    }

    /// Assess one obstacle. Pure function of inputs and configuration.
    pub fn assess_risk(&self, detection: &Detection, zone: Zone, is_static: bool) -> RiskAssessment {
        let distance = self.distance_estimator.estimate_distance(detection);
        let ttc = self.distance_estimator.ttc_at_train_speed(distance);
        let risk_score = risk_score(detection.class, zone, ttc, is_static);

        RiskAssessment {
            obstacle_class: detection.class,
            distance_m: round2(distance),
            ttc_seconds: round2(ttc),
            ttc_level: self.distance_estimator.ttc_level(ttc),
            zone,
            risk_score,
            risk_level: risk_level(risk_score),
            is_static,
        }
    }

    /// Assess a set of obstacles and report the worst case plus tier counts.
    pub fn assess_many(&self, obstacles: &[(Detection, Zone, bool)]) -> BatchRiskAssessment {
        let assessments: Vec<RiskAssessment> = obstacles
            .iter()
            .map(|(det, zone, is_static)| self.assess_risk(det, *zone, *is_static))
            .collect();

        let mut max_risk_score = 0.0;
        let mut max_risk_level = Severity::Low;
        for assessment in &assessments {
            if assessment.risk_score > max_risk_score {
                max_risk_score = assessment.risk_score;
                max_risk_level = assessment.risk_level;
            }
        }

        BatchRiskAssessment {
            max_risk_level,
            max_risk_score,
            obstacle_count: assessments.len(),
            critical_count: assessments
                .iter()
                .filter(|a| a.risk_level == Severity::Critical)
                .count(),
            high_count: assessments
                .iter()
                .filter(|a| a.risk_level == Severity::High)
                .count(),
            assessments,
        }
    }
}

/// Additive score: class base, zone multiplier, TTC bonus, static bonus,
/// clamped to 100.
fn risk_score(class: ObstacleClass, zone: Zone, ttc: f64, is_static: bool) -> f64 {
    let mut score: f64 = match class {
        ObstacleClass::Human => 40.0,
        ObstacleClass::Vehicle => 35.0,
        ObstacleClass::Animal => 30.0,
        ObstacleClass::Debris => 20.0,
    };

    score *= match zone {
        Zone::Critical => 2.0,
        Zone::Warning => 1.5,
        Zone::Safe => 0.5,
    };

    // First matching band wins
    if ttc < 10.0 {
        score += 30.0;
    } else if ttc < 20.0 {
        score += 20.0;
    } else if ttc < 40.0 {
        score += 10.0;
    }

    if is_static {
        score += 10.0;
    }

    score.min(100.0)
}

/// Half-open bands, inclusive lower bound.
fn risk_level(score: f64) -> Severity {
    if score >= 75.0 {
        Severity::Critical
    } else if score >= 50.0 {
        Severity::High
    } else if score >= 25.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        value
    }
}
