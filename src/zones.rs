// src/zones.rs
//
// Static geometric model of the rail corridor. The track occupies a
// vertical band of the frame; lateral distance from the frame midline
// buckets an obstacle into critical / warning / safe.

use crate::types::{BoundingBox, TrackConfig, Zone};
use anyhow::{bail, Result};
use tracing::info;

/// Pixel rectangles of the critical and warning bands, for overlays and
/// operator tooling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneCoordinates {
    pub critical: (i32, i32, i32, i32),
    pub warning: (i32, i32, i32, i32),
}

pub struct TrackZones {
    config: TrackConfig,
    dimensions: Option<(u32, u32)>,
}

impl TrackZones {
    pub fn new(config: TrackConfig) -> Self {
        Self {
            config,
            dimensions: None,
        }
    }

    /// Bind the fractional geometry to concrete frame dimensions. Safe to
    /// call again when the source resolution changes.
    pub fn initialize(&mut self, width: u32, height: u32) {
        info!("Track zones initialised for {}x{} frames", width, height);
        self.dimensions = Some((width, height));
    }

    pub fn is_initialized(&self) -> bool {
        self.dimensions.is_some()
    }

    /// Classify a bbox by its center. Pure function of config + bbox;
    /// calling before `initialize` is a precondition violation.
    pub fn classify(&self, bbox: &BoundingBox) -> Result<Zone> {
        let Some((width, height)) = self.dimensions else {
            bail!("zone classifier used before frame dimensions were initialised");
        };

        let (center_x, center_y) = bbox.center();
        let norm_x = center_x / width as f64;
        let norm_y = center_y / height as f64;

        // Outside the vertical track band nothing can be on the rails.
        if norm_y < self.config.track_top_y || norm_y > self.config.track_bottom_y {
            return Ok(Zone::Safe);
        }

        let distance_from_center = (norm_x - 0.5).abs();

        if distance_from_center <= self.config.critical_zone_width / 2.0 {
            Ok(Zone::Critical)
        } else if distance_from_center <= self.config.warning_zone_width / 2.0 {
            Ok(Zone::Warning)
        } else {
            Ok(Zone::Safe)
        }
    }

    pub fn zone_coordinates(&self) -> Option<ZoneCoordinates> {
        let (width, height) = self.dimensions?;
        let (w, h) = (width as f64, height as f64);
        let center_x = w / 2.0;

        let half_critical = w * self.config.critical_zone_width / 2.0;
        let half_warning = w * self.config.warning_zone_width / 2.0;
        let top_y = (h * self.config.track_top_y) as i32;
        let bottom_y = (h * self.config.track_bottom_y) as i32;

        Some(ZoneCoordinates {
            critical: (
                (center_x - half_critical) as i32,
                top_y,
                (center_x + half_critical) as i32,
                bottom_y,
            ),
            warning: (
                (center_x - half_warning) as i32,
                top_y,
                (center_x + half_warning) as i32,
                bottom_y,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> TrackZones {
        let mut zones = TrackZones::new(TrackConfig::default());
        zones.initialize(1280, 720);
        zones
    }

    /// Centered bbox at the midpoint of the track band.
    fn centered_bbox() -> BoundingBox {
        // Band midpoint: (0.4 + 0.95) / 2 = 0.675 → y = 486 at 720p
        BoundingBox::new(620, 476, 660, 496)
    }

    #[test]
    fn test_center_of_track_is_critical() {
        let zones = zones();
        assert_eq!(zones.classify(&centered_bbox()).unwrap(), Zone::Critical);
    }

    #[test]
    fn test_lateral_offset_is_warning() {
        let zones = zones();
        // norm_x = 0.65 → 0.15 from center, between 0.125 and 0.20
        let bbox = BoundingBox::new(812, 476, 852, 496);
        assert_eq!(zones.classify(&bbox).unwrap(), Zone::Warning);
    }

    #[test]
    fn test_far_lateral_offset_is_safe() {
        let zones = zones();
        // norm_x = 0.85 → 0.35 from center, beyond the warning half-width
        let bbox = BoundingBox::new(1068, 476, 1108, 496);
        assert_eq!(zones.classify(&bbox).unwrap(), Zone::Safe);
    }

    #[test]
    fn test_above_track_band_is_safe_even_when_centered() {
        let zones = zones();
        // norm_y ≈ 0.2 < track_top_y
        let bbox = BoundingBox::new(620, 134, 660, 154);
        assert_eq!(zones.classify(&bbox).unwrap(), Zone::Safe);
    }

    #[test]
    fn test_classify_before_initialize_fails() {
        let zones = TrackZones::new(TrackConfig::default());
        assert!(zones.classify(&centered_bbox()).is_err());
    }

    #[test]
    fn test_reinitialize_rebinds_geometry() {
        let mut zones = zones();
        let bbox = BoundingBox::new(620, 476, 660, 496);
        assert_eq!(zones.classify(&bbox).unwrap(), Zone::Critical);

        // At 4k the same pixel bbox sits far left of center and above the band
        zones.initialize(3840, 2160);
        assert_eq!(zones.classify(&bbox).unwrap(), Zone::Safe);
    }

    #[test]
    fn test_zone_coordinates_pixel_rects() {
        let zones = zones();
        let coords = zones.zone_coordinates().unwrap();
        // Critical band: 1280 * 0.25 wide, centered on x = 640
        assert_eq!(coords.critical, (480, 288, 800, 684));
        assert_eq!(coords.warning, (384, 288, 896, 684));
    }
}
