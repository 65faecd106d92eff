// src/alerts.rs
//
// Alert formatting and delivery. The escalation table maps severity to an
// ordered channel list; every channel is attempted independently, so one
// unreachable endpoint never starves the others. The aggregate
// fully-delivered flag is reported back for metrics and the event log.

use crate::incident::Incident;
use crate::types::{AlertConfig, ChannelKind, ObstacleClass, Severity};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{error, info, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const ALERT_LOG_CAPACITY: usize = 1000;

/// Outcome of one alert dispatch: which channels were attempted and how
/// each fared. Disabled channels are skipped, not failed.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub incident_id: String,
    pub channels: Vec<(ChannelKind, bool)>,
    pub fully_delivered: bool,
}

#[derive(Debug, Clone)]
struct AlertLogEntry {
    timestamp: DateTime<Utc>,
    incident_id: String,
    severity: Severity,
    obstacle_class: ObstacleClass,
}

#[derive(Debug, Clone)]
pub struct AlertStatistics {
    pub total_alerts: usize,
    pub by_severity: HashMap<Severity, usize>,
    pub by_type: HashMap<ObstacleClass, usize>,
    pub recent_ids: Vec<String>,
}

pub struct AlertManager {
    config: AlertConfig,
    http_client: reqwest::Client,
    history: VecDeque<AlertLogEntry>,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            config,
            http_client,
            history: VecDeque::with_capacity(ALERT_LOG_CAPACITY),
        }
    }

    /// Ordered channel list for a severity. Unmapped severities are
    /// log-only.
    pub fn channels_for(&self, severity: Severity) -> Vec<ChannelKind> {
        self.config
            .escalation
            .get(&severity)
            .cloned()
            .unwrap_or_else(|| vec![ChannelKind::LogOnly])
    }

    /// Dispatch one incident across its escalation channels.
    pub async fn send_alert(&mut self, incident: &Incident) -> DeliveryReport {
        let message = self.format_alert_message(incident);
        let mut channels = Vec::new();

        for channel in self.channels_for(incident.severity) {
            let outcome = match channel {
                ChannelKind::Local => Some(self.send_local(&message, incident.severity)),
                ChannelKind::Telegram => {
                    if self.config.telegram.enabled {
                        Some(self.send_telegram(&message).await)
                    } else {
                        None
                    }
                }
                ChannelKind::Sms => {
                    if self.config.sms.enabled {
                        Some(self.send_sms(&message).await)
                    } else {
                        None
                    }
                }
                ChannelKind::LogOnly => Some(true),
            };
            if let Some(ok) = outcome {
                channels.push((channel, ok));
            }
        }

        self.log_alert(incident);

        let fully_delivered = channels.iter().all(|(_, ok)| *ok);
        if !fully_delivered {
            warn!(
                "Alert {} partially delivered: {:?}",
                incident.incident_id, channels
            );
        }

        DeliveryReport {
            incident_id: incident.incident_id.clone(),
            channels,
            fully_delivered,
        }
    }

    pub fn format_alert_message(&self, incident: &Incident) -> String {
        let severity = incident.severity;
        let emoji = match severity {
            Severity::Critical => "🚨",
            Severity::High => "⚠️",
            Severity::Medium => "🟡",
            Severity::Low => "ℹ️",
        };

        let mut message = format!(
            "{} RAILTRACK ALERT - {}\n\n{}\n\n",
            emoji,
            severity.as_str().to_uppercase(),
            incident.explanation
        );
        message += &format!(
            "Obstacle Type: {}\n",
            incident.obstacle.class.as_str().to_uppercase()
        );
        message += &format!(
            "Location Zone: {}\n",
            incident.location.zone.as_str().to_uppercase()
        );
        if let Some(distance) = incident.risk_assessment.distance_meters {
            message += &format!("Distance: {:.1}m\n", distance);
        }
        if let Some(ttc) = incident.risk_assessment.ttc_seconds {
            message += &format!("Time to Collision: {:.1}s\n", ttc);
        }
        message += &format!("\nRecommended Action: {}\n", incident.recommended_action);
        message += &format!("\nTimestamp: {}", incident.timestamp.to_rfc3339());

        message
    }

    /// Console channel: colored banner plus terminal bell for audible alert.
    fn send_local(&self, message: &str, severity: Severity) -> bool {
        let color = match severity {
            Severity::Critical => "\x1b[91m",
            Severity::High => "\x1b[93m",
            Severity::Medium => "\x1b[94m",
            Severity::Low => "\x1b[92m",
        };
        let bell = if self.config.local.sound_alert { "\x07" } else { "" };
        println!(
            "\n{}{}\n{}\n{}{}\x1b[0m\n",
            color,
            "=".repeat(60),
            message,
            "=".repeat(60),
            bell
        );
        true
    }

    async fn send_telegram(&self, message: &str) -> bool {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.telegram.bot_token
        );

        let mut all_ok = true;
        for chat_id in &self.config.telegram.chat_ids {
            let body = json!({ "chat_id": chat_id, "text": message });
            match self.http_client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Telegram alert delivered to chat {}", chat_id);
                }
                Ok(resp) => {
                    warn!("Telegram API error for chat {}: {}", chat_id, resp.status());
                    all_ok = false;
                }
                Err(e) => {
                    error!("Failed to reach Telegram API: {}", e);
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    async fn send_sms(&self, message: &str) -> bool {
        let mut all_ok = true;
        for recipient in &self.config.sms.recipients {
            let body = json!({ "to": recipient, "message": message });
            match self
                .http_client
                .post(&self.config.sms.gateway_url)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!("SMS alert queued for {}", recipient);
                }
                Ok(resp) => {
                    warn!("SMS gateway error for {}: {}", recipient, resp.status());
                    all_ok = false;
                }
                Err(e) => {
                    error!("Failed to reach SMS gateway: {}", e);
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    fn log_alert(&mut self, incident: &Incident) {
        if self.history.len() == ALERT_LOG_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(AlertLogEntry {
            timestamp: Utc::now(),
            incident_id: incident.incident_id.clone(),
            severity: incident.severity,
            obstacle_class: incident.obstacle.class,
        });
    }

    pub fn statistics(&self) -> AlertStatistics {
        let mut by_severity: HashMap<Severity, usize> = HashMap::new();
        let mut by_type: HashMap<ObstacleClass, usize> = HashMap::new();
        for entry in &self.history {
            *by_severity.entry(entry.severity).or_insert(0) += 1;
            *by_type.entry(entry.obstacle_class).or_insert(0) += 1;
        }
        AlertStatistics {
            total_alerts: self.history.len(),
            by_severity,
            by_type,
            recent_ids: self
                .history
                .iter()
                .rev()
                .take(10)
                .map(|e| e.incident_id.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::ConfirmedObstacle;
    use crate::incident::IncidentReporter;
    use crate::types::{BoundingBox, Detection, RiskAssessment, TtcLevel, Zone};

    fn incident(severity_zone: Zone, ttc: f64) -> Incident {
        let obstacle = ConfirmedObstacle {
            track_id: 1,
            detection: Detection {
                class: ObstacleClass::Human,
                confidence: 0.95,
                bbox: BoundingBox::new(200, 200, 250, 400),
            },
            duration_secs: 4.0,
            is_static: false,
            frame_count: 5,
            newly_confirmed: false,
        };
        let assessment = RiskAssessment {
            obstacle_class: ObstacleClass::Human,
            distance_m: 200.0,
            ttc_seconds: ttc,
            ttc_level: TtcLevel::Critical,
            zone: severity_zone,
            risk_score: 100.0,
            risk_level: Severity::Critical,
            is_static: false,
        };
        IncidentReporter::new().generate_report(&obstacle, &assessment, None, 60.0)
    }

    #[test]
    fn test_escalation_resolution() {
        let manager = AlertManager::new(AlertConfig::default());
        assert_eq!(
            manager.channels_for(Severity::Critical),
            vec![ChannelKind::Local, ChannelKind::Telegram, ChannelKind::Sms]
        );
        assert_eq!(
            manager.channels_for(Severity::Medium),
            vec![ChannelKind::Local]
        );
    }

    #[test]
    fn test_message_format_contains_key_fields() {
        let manager = AlertManager::new(AlertConfig::default());
        let incident = incident(Zone::Critical, 12.0);
        let message = manager.format_alert_message(&incident);

        assert!(message.contains("RAILTRACK ALERT - CRITICAL"));
        assert!(message.contains("Obstacle Type: HUMAN"));
        assert!(message.contains("Location Zone: CRITICAL"));
        assert!(message.contains("Distance: 200.0m"));
        assert!(message.contains("Time to Collision: 12.0s"));
        assert!(message.contains("Recommended Action: IMMEDIATE ACTION REQUIRED"));
    }

    #[tokio::test]
    async fn test_disabled_remote_channels_are_skipped_not_failed() {
        // Default config: telegram and sms disabled, local enabled
        let mut manager = AlertManager::new(AlertConfig::default());
        let report = manager.send_alert(&incident(Zone::Critical, 12.0)).await;

        assert!(report.fully_delivered);
        assert_eq!(report.channels, vec![(ChannelKind::Local, true)]);
    }

    #[tokio::test]
    async fn test_alert_statistics_accumulate() {
        let mut manager = AlertManager::new(AlertConfig::default());
        manager.send_alert(&incident(Zone::Critical, 12.0)).await;
        manager.send_alert(&incident(Zone::Critical, 14.0)).await;

        let stats = manager.statistics();
        assert_eq!(stats.total_alerts, 2);
        assert_eq!(stats.by_severity[&Severity::Critical], 2);
        assert_eq!(stats.by_type[&ObstacleClass::Human], 2);
        assert_eq!(stats.recent_ids.len(), 2);
    }
}
