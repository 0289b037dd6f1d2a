#[allow(unused_imports)]
use num_traits::Float;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::consts::{MAG_MAX_DEVIATION, MAG_UNCALIBRATED_EPS};

/// Hard-iron calibration of a magnetometer: the sensor bias and the expected field strength.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MagCalibration {
    /// Hard-iron bias, subtracted from raw readings.
    pub offset: Vector3<f32>,
    /// Radius of the fitted sphere, the expected magnitude of the field.
    pub radius: f32,
}

impl MagCalibration {
    pub const fn new(offset: Vector3<f32>, radius: f32) -> Self {
        Self { offset, radius }
    }

    /// Remove the hard-iron bias from a raw reading.
    pub fn apply(&self, raw: impl Into<Vector3<f32>>) -> Vector3<f32> {
        raw.into() - self.offset
    }

    /// Whether these values look like they were never produced by a calibration.
    ///
    /// This is the case when any offset component or the radius is (close to) zero,
    /// so a genuinely zero offset on one axis is also reported as uncalibrated.
    pub fn is_uncalibrated(&self) -> bool {
        let product = self.offset.x * self.offset.y * self.offset.z * self.radius;
        product.abs() < MAG_UNCALIBRATED_EPS
    }

    /// Check the calibration against a live reading, allowing the default deviation.
    pub fn is_valid(&self, sample: impl Into<Vector3<f32>>) -> bool {
        self.is_valid_within(sample, MAG_MAX_DEVIATION)
    }

    /// Check the calibration against a live reading.
    ///
    /// The calibration is invalid if it looks uncalibrated, or if the magnitude
    /// of `sample` deviates from the fitted radius by more than `max_deviation`
    /// (relative).
    pub fn is_valid_within(&self, sample: impl Into<Vector3<f32>>, max_deviation: f32) -> bool {
        if self.is_uncalibrated() {
            return false;
        }

        let ratio = sample.into().norm() / self.radius;
        (ratio - 1.0).abs() <= max_deviation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FITTED: MagCalibration = MagCalibration::new(Vector3::new(1.0, 2.0, 3.0), 10.0);

    #[test]
    fn test_valid_on_matching_magnitude() {
        assert!(FITTED.is_valid([6.0, 8.0, 0.0]));
        assert!(FITTED.is_valid([0.0, 0.0, -10.0]));
    }

    #[test]
    fn test_never_calibrated_is_invalid() {
        let calib = MagCalibration::default();
        assert!(calib.is_uncalibrated());
        assert!(!calib.is_valid([6.0, 8.0, 0.0]));
    }

    #[test]
    fn test_single_zero_axis_is_uncalibrated() {
        let calib = MagCalibration::new(Vector3::new(1.0, 0.0, 3.0), 10.0);
        assert!(!calib.is_valid([6.0, 8.0, 0.0]));
    }

    #[test]
    fn test_negative_offset_is_calibrated() {
        let calib = MagCalibration::new(Vector3::new(-1.0, 2.0, 3.0), 10.0);
        assert!(!calib.is_uncalibrated());
        assert!(calib.is_valid([6.0, 8.0, 0.0]));
    }

    #[test]
    fn test_plausibility_rejection() {
        // 30% deviation is the limit
        assert!(FITTED.is_valid([0.0, 12.9, 0.0]));
        assert!(FITTED.is_valid([0.0, 7.1, 0.0]));
        assert!(!FITTED.is_valid([0.0, 13.5, 0.0]));
        assert!(!FITTED.is_valid([0.0, 6.5, 0.0]));
        assert!(!FITTED.is_valid([0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_custom_deviation() {
        assert!(!FITTED.is_valid_within([0.0, 11.5, 0.0], 0.1));
        assert!(FITTED.is_valid_within([0.0, 11.5, 0.0], 0.2));
    }

    #[test]
    fn test_apply_removes_offset() {
        let corrected = FITTED.apply([7.0, 10.0, 3.0]);
        assert_eq!(Vector3::new(6.0, 8.0, 0.0), corrected);
        assert_eq!(10.0, corrected.norm());
    }
}
