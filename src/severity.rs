// src/severity.rs
//
// Rule-based severity classification. Three ordered predicate tables are
// evaluated top-down; the first tier with any satisfied rule wins, and
// anything that matches nothing is low. The tables are data so the exact
// evaluation order (and the deliberately uneven TTC cutoffs) stays
// auditable in one place.

use crate::types::{ObstacleClass, Severity, Zone};
use chrono::{DateTime, Utc};

/// The facts severity rules are allowed to look at.
#[derive(Debug, Clone, Copy)]
pub struct IncidentFacts {
    pub obstacle_class: ObstacleClass,
    pub zone: Zone,
    pub ttc: f64,
    pub is_static: bool,
}

/// One predicate row: every present field must hold for the rule to fire.
struct SeverityRule {
    classes: Option<&'static [ObstacleClass]>,
    zone: Option<Zone>,
    ttc_below: Option<f64>,
    requires_static: bool,
}

impl SeverityRule {
    fn matches(&self, facts: &IncidentFacts) -> bool {
        if let Some(classes) = self.classes {
            if !classes.contains(&facts.obstacle_class) {
                return false;
            }
        }
        if let Some(zone) = self.zone {
            if facts.zone != zone {
                return false;
            }
        }
        if let Some(cutoff) = self.ttc_below {
            if !(facts.ttc < cutoff) {
                return false;
            }
        }
        if self.requires_static && !facts.is_static {
            return false;
        }
        true
    }
}

const CRITICAL_RULES: &[SeverityRule] = &[
    // Human on the track with low TTC
    SeverityRule {
        classes: Some(&[ObstacleClass::Human]),
        zone: Some(Zone::Critical),
        ttc_below: Some(20.0),
        requires_static: false,
    },
    // Vehicle on the track with very low TTC
    SeverityRule {
        classes: Some(&[ObstacleClass::Vehicle]),
        zone: Some(Zone::Critical),
        ttc_below: Some(15.0),
        requires_static: false,
    },
    // Any stationary obstacle on the track with low TTC
    SeverityRule {
        classes: None,
        zone: Some(Zone::Critical),
        ttc_below: Some(25.0),
        requires_static: true,
    },
    // Human or vehicle on the track at very close range
    SeverityRule {
        classes: Some(&[ObstacleClass::Human, ObstacleClass::Vehicle]),
        zone: Some(Zone::Critical),
        ttc_below: Some(10.0),
        requires_static: false,
    },
];

const HIGH_RULES: &[SeverityRule] = &[
    // Human near the track with moderate TTC
    SeverityRule {
        classes: Some(&[ObstacleClass::Human]),
        zone: Some(Zone::Warning),
        ttc_below: Some(40.0),
        requires_static: false,
    },
    // Animal on the track
    SeverityRule {
        classes: Some(&[ObstacleClass::Animal]),
        zone: Some(Zone::Critical),
        ttc_below: None,
        requires_static: false,
    },
    // Stationary debris on the track
    SeverityRule {
        classes: Some(&[ObstacleClass::Debris]),
        zone: Some(Zone::Critical),
        ttc_below: None,
        requires_static: true,
    },
    // Vehicle near the track with low TTC
    SeverityRule {
        classes: Some(&[ObstacleClass::Vehicle]),
        zone: Some(Zone::Warning),
        ttc_below: Some(30.0),
        requires_static: false,
    },
    // Anything on the track with moderate TTC
    SeverityRule {
        classes: None,
        zone: Some(Zone::Critical),
        ttc_below: Some(40.0),
        requires_static: false,
    },
];

const MEDIUM_RULES: &[SeverityRule] = &[
    // Animal near the track
    SeverityRule {
        classes: Some(&[ObstacleClass::Animal]),
        zone: Some(Zone::Warning),
        ttc_below: None,
        requires_static: false,
    },
    // Debris on the track
    SeverityRule {
        classes: Some(&[ObstacleClass::Debris]),
        zone: Some(Zone::Critical),
        ttc_below: None,
        requires_static: false,
    },
    // Vehicle near the track
    SeverityRule {
        classes: Some(&[ObstacleClass::Vehicle]),
        zone: Some(Zone::Warning),
        ttc_below: Some(60.0),
        requires_static: false,
    },
    // Human anywhere with closing TTC
    SeverityRule {
        classes: Some(&[ObstacleClass::Human]),
        zone: None,
        ttc_below: Some(60.0),
        requires_static: false,
    },
    // Anything on the track with high TTC
    SeverityRule {
        classes: None,
        zone: Some(Zone::Critical),
        ttc_below: Some(60.0),
        requires_static: false,
    },
];

#[derive(Debug, Clone)]
pub struct ClassifiedIncident {
    pub facts: IncidentFacts,
    pub severity: Severity,
    pub severity_priority: u8,
    pub severity_color: (u8, u8, u8),
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct SeverityClassifier;

impl SeverityClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, facts: &IncidentFacts) -> Severity {
        let tiers: [(&[SeverityRule], Severity); 3] = [
            (CRITICAL_RULES, Severity::Critical),
            (HIGH_RULES, Severity::High),
            (MEDIUM_RULES, Severity::Medium),
        ];
        for (rules, severity) in tiers {
            if rules.iter().any(|rule| rule.matches(facts)) {
                return severity;
            }
        }
        Severity::Low
    }

    pub fn recommended_action(&self, severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => {
                "IMMEDIATE ACTION REQUIRED: Alert driver, activate emergency braking if available, notify control room"
            }
            Severity::High => {
                "URGENT: Alert driver, reduce speed, notify control room and nearest station"
            }
            Severity::Medium => {
                "CAUTION: Monitor situation, notify control room, prepare for potential action"
            }
            Severity::Low => "ADVISORY: Log incident, continue monitoring",
        }
    }

    /// Classify a batch and order it worst-first. The sort is stable, so
    /// equal-priority incidents keep their arrival order.
    pub fn classify_batch(&self, incidents: Vec<IncidentFacts>) -> Vec<ClassifiedIncident> {
        let timestamp = Utc::now();
        let mut classified: Vec<ClassifiedIncident> = incidents
            .into_iter()
            .map(|facts| {
                let severity = self.classify(&facts);
                ClassifiedIncident {
                    facts,
                    severity,
                    severity_priority: severity.priority(),
                    severity_color: severity.color(),
                    timestamp,
                }
            })
            .collect();

        classified.sort_by(|a, b| b.severity_priority.cmp(&a.severity_priority));
        classified
    }
}
