// src/distance.rs
//
// Monocular distance and time-to-collision estimation. Pinhole model:
// distance = known_height * focal_length / pixel_height. Per-class
// reference heights come from configuration.

use crate::types::{Detection, DistanceConfig, TtcLevel};
use tracing::info;

pub struct DistanceEstimator {
    config: DistanceConfig,
}

impl DistanceEstimator {
    pub fn new(config: DistanceConfig) -> Self {
        Self { config }
    }

    /// Estimated distance in meters. A zero-height bbox yields +∞ rather
    /// than dividing by zero.
    pub fn estimate_distance(&self, detection: &Detection) -> f64 {
        let known_height = self.config.known_heights.height_for(detection.class);
        let pixel_height = detection.bbox.height();

        if pixel_height == 0 {
            return f64::INFINITY;
        }

        let distance = known_height * self.config.focal_length / pixel_height as f64;
        distance.max(0.0)
    }

    /// Seconds until the train covers `distance` at `speed_kmh`. A stopped
    /// train never collides: speed 0 yields +∞.
    pub fn calculate_ttc(&self, distance: f64, speed_kmh: f64) -> f64 {
        if speed_kmh == 0.0 {
            return f64::INFINITY;
        }
        let speed_ms = speed_kmh / 3.6;
        distance / speed_ms
    }

    /// TTC with the configured train speed.
    pub fn ttc_at_train_speed(&self, distance: f64) -> f64 {
        self.calculate_ttc(distance, self.config.train_speed_kmh)
    }

    /// Ascending-threshold banding; first matching band wins.
    pub fn ttc_level(&self, ttc: f64) -> TtcLevel {
        if ttc < self.config.ttc_critical {
            TtcLevel::Critical
        } else if ttc < self.config.ttc_high {
            TtcLevel::High
        } else if ttc < self.config.ttc_medium {
            TtcLevel::Medium
        } else {
            TtcLevel::Low
        }
    }

    pub fn train_speed_kmh(&self) -> f64 {
        self.config.train_speed_kmh
    }

    /// One-shot calibration: back-solve the focal length from a reference
    /// object of known height at a known distance. The only configuration
    /// mutation in the whole pipeline.
    pub fn calibrate_focal_length(
        &mut self,
        known_distance: f64,
        known_height: f64,
        pixel_height: i32,
    ) -> f64 {
        let focal_length = pixel_height as f64 * known_distance / known_height;
        self.config.focal_length = focal_length;
        info!("Focal length calibrated to {:.2} pixels", focal_length);
        focal_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, ObstacleClass};

    fn human(bbox: BoundingBox) -> Detection {
        Detection {
            class: ObstacleClass::Human,
            confidence: 0.95,
            bbox,
        }
    }

    fn estimator() -> DistanceEstimator {
        DistanceEstimator::new(DistanceConfig::default())
    }

    #[test]
    fn test_reference_distance_for_200px_human() {
        let est = estimator();
        // 1.7m * 800 / 200px = 6.8m
        let distance = est.estimate_distance(&human(BoundingBox::new(200, 200, 250, 400)));
        assert!((distance - 6.8).abs() < 1e-9);
    }

    #[test]
    fn test_ttc_at_60_kmh() {
        let est = estimator();
        // 6.8m at 16.667 m/s ≈ 0.408s
        let ttc = est.calculate_ttc(6.8, 60.0);
        assert!((ttc - 0.408).abs() < 1e-3);
    }

    #[test]
    fn test_zero_pixel_height_is_infinite_distance() {
        let est = estimator();
        let distance = est.estimate_distance(&human(BoundingBox::new(200, 200, 250, 200)));
        assert!(distance.is_infinite());
    }

    #[test]
    fn test_zero_speed_is_infinite_ttc() {
        let est = estimator();
        assert!(est.calculate_ttc(100.0, 0.0).is_infinite());
    }

    #[test]
    fn test_infinite_distance_flows_into_low_band() {
        let est = estimator();
        let ttc = est.calculate_ttc(f64::INFINITY, 60.0);
        assert_eq!(est.ttc_level(ttc), TtcLevel::Low);
    }

    #[test]
    fn test_ttc_level_bands() {
        let est = estimator();
        assert_eq!(est.ttc_level(10.0), TtcLevel::Critical);
        assert_eq!(est.ttc_level(20.0), TtcLevel::High);
        assert_eq!(est.ttc_level(39.9), TtcLevel::High);
        assert_eq!(est.ttc_level(40.0), TtcLevel::Medium);
        assert_eq!(est.ttc_level(60.0), TtcLevel::Low);
    }

    #[test]
    fn test_per_class_known_heights() {
        let est = estimator();
        let bbox = BoundingBox::new(0, 0, 50, 100);
        let debris = Detection {
            class: ObstacleClass::Debris,
            confidence: 0.9,
            bbox,
        };
        // 0.3m * 800 / 100px = 2.4m
        assert!((est.estimate_distance(&debris) - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_back_solves_focal_length() {
        let mut est = estimator();
        // An object of 1.7m at 6.8m spanning 200px implies f = 800
        let focal = est.calibrate_focal_length(6.8, 1.7, 200);
        assert!((focal - 800.0).abs() < 1e-9);

        // The calibrated value is what later estimates use
        est.calibrate_focal_length(10.0, 1.7, 200);
        let distance = est.estimate_distance(&human(BoundingBox::new(200, 200, 250, 400)));
        assert!((distance - 10.0).abs() < 1e-9);
    }
}
