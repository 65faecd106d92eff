use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// DOMAIN TYPES
// ============================================================================

/// Obstacle category reported by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleClass {
    Human,
    Vehicle,
    Animal,
    Debris,
}

impl ObstacleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Vehicle => "vehicle",
            Self::Animal => "animal",
            Self::Debris => "debris",
        }
    }
}

/// Axis-aligned pixel bounding box. Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl From<[i32; 4]> for BoundingBox {
    fn from(b: [i32; 4]) -> Self {
        Self {
            x1: b[0],
            y1: b[1],
            x2: b[2],
            y2: b[3],
        }
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 + self.x2) as f64 / 2.0,
            (self.y1 + self.y2) as f64 / 2.0,
        )
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Degenerate boxes (`x2 <= x1` or `y2 <= y1`) are dropped before tracking.
    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

/// Distance between two bbox centers, in pixels.
pub fn centroid_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

/// One detection from the external detector. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: ObstacleClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Wire format of one frame on the detector boundary (one JSON line per frame).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Lateral safety zone relative to the rail corridor. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Critical,
    Warning,
    Safe,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Safe => "safe",
        }
    }
}

/// Time-to-collision band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtcLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// Incident urgency tier driving escalation and recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Numeric priority, higher is more severe. Used to order incidents.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// Display color as a BGR triple.
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Critical => (0, 0, 255),
            Self::High => (0, 165, 255),
            Self::Medium => (0, 255, 255),
            Self::Low => (0, 255, 0),
        }
    }
}

/// Per-obstacle risk synthesis, recomputed every frame. No hidden state.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub obstacle_class: ObstacleClass,
    pub distance_m: f64,
    pub ttc_seconds: f64,
    pub ttc_level: TtcLevel,
    pub zone: Zone,
    pub risk_score: f64,
    pub risk_level: Severity,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub track: TrackConfig,
    pub tracker: TrackerConfig,
    pub confirmation: ConfirmationConfig,
    pub filter: FilterConfig,
    pub distance: DistanceConfig,
    pub alerts: AlertConfig,
    pub persistence: PersistenceConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

/// Zone geometry as fractions of the frame, centered on the horizontal
/// midline. The critical/warning widths are full widths, not half-widths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub track_top_y: f64,
    pub track_bottom_y: f64,
    pub critical_zone_width: f64,
    pub warning_zone_width: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            track_top_y: 0.4,
            track_bottom_y: 0.95,
            critical_zone_width: 0.25,
            warning_zone_width: 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Gating distance in pixels for centroid association.
    pub max_distance: f64,
    /// Frames a track survives unmatched before deregistration.
    pub max_disappeared: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            max_disappeared: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub min_consecutive_frames: usize,
    pub max_frame_gap: u64,
    /// Pixel displacement below which an obstacle counts as stationary.
    pub movement_threshold: f64,
    /// Wall-clock seconds before an inactive history entry is purged.
    pub timeout_secs: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            min_consecutive_frames: 5,
            max_frame_gap: 3,
            movement_threshold: 50.0,
            timeout_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum bbox area in px².
    pub min_size: i64,
    /// Longer side / shorter side above this is rejected as implausible.
    pub max_aspect_ratio: f64,
    pub debris_min_confidence: f32,
    pub duplicate_window_secs: f64,
    /// Center distance in pixels under which two alerts are the same spot.
    pub duplicate_distance: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_size: 1000,
            max_aspect_ratio: 10.0,
            debris_min_confidence: 0.6,
            duplicate_window_secs: 30.0,
            duplicate_distance: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownHeights {
    pub human: f64,
    pub vehicle: f64,
    pub animal: f64,
    pub debris: f64,
}

impl Default for KnownHeights {
    fn default() -> Self {
        Self {
            human: 1.7,
            vehicle: 1.5,
            animal: 0.8,
            debris: 0.3,
        }
    }
}

impl KnownHeights {
    pub fn height_for(&self, class: ObstacleClass) -> f64 {
        match class {
            ObstacleClass::Human => self.human,
            ObstacleClass::Vehicle => self.vehicle,
            ObstacleClass::Animal => self.animal,
            ObstacleClass::Debris => self.debris,
        }
    }
}

/// One-shot focal length calibration from a reference measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub known_distance: f64,
    pub known_height: f64,
    pub pixel_height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Focal length in pixels.
    pub focal_length: f64,
    pub known_heights: KnownHeights,
    pub train_speed_kmh: f64,
    pub ttc_critical: f64,
    pub ttc_high: f64,
    pub ttc_medium: f64,
    pub calibration: Option<CalibrationConfig>,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            focal_length: 800.0,
            known_heights: KnownHeights::default(),
            train_speed_kmh: 60.0,
            ttc_critical: 20.0,
            ttc_high: 40.0,
            ttc_medium: 60.0,
            calibration: None,
        }
    }
}

/// Alert delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Local,
    Telegram,
    Sms,
    LogOnly,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Telegram => "telegram",
            Self::Sms => "sms",
            Self::LogOnly => "log_only",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub gateway_url: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalAlertConfig {
    pub sound_alert: bool,
}

impl Default for LocalAlertConfig {
    fn default() -> Self {
        Self { sound_alert: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Severity → ordered channel list.
    pub escalation: HashMap<Severity, Vec<ChannelKind>>,
    pub telegram: TelegramConfig,
    pub sms: SmsConfig,
    pub local: LocalAlertConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let mut escalation = HashMap::new();
        escalation.insert(
            Severity::Critical,
            vec![ChannelKind::Local, ChannelKind::Telegram, ChannelKind::Sms],
        );
        escalation.insert(
            Severity::High,
            vec![ChannelKind::Local, ChannelKind::Telegram],
        );
        escalation.insert(Severity::Medium, vec![ChannelKind::Local]);
        escalation.insert(Severity::Low, vec![ChannelKind::LogOnly]);
        Self {
            escalation,
            telegram: TelegramConfig::default(),
            sms: SmsConfig::default(),
            local: LocalAlertConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub log_directory: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            log_directory: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Directory scanned for `.jsonl` detection streams.
    pub input_dir: String,
    pub source_width: u32,
    pub source_height: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/detections".to_string(),
            source_width: 1280,
            source_height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
