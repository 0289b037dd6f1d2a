pub mod mag_routine;
pub mod sample_buffer;
pub mod sens3d;
pub mod sphere_fit;

use serde::{Deserialize, Serialize};

use crate::{
    consts::{MAG_CONVERGENCE_DELTA, MAG_MAX_DEVIATION, MAG_MAX_ITERATIONS, MAG_SAMPLES},
    errors::CalibrationError,
};

/// Configuration of a magnetometer calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagCalib {
    /// Number of samples to collect before the sphere is fitted.
    pub capacity: usize,
    /// Upper bound on sphere fit refinement iterations.
    pub max_iterations: u32,
    /// Squared step length at which refinement stops early.
    pub convergence_delta: f32,
    /// Accepted relative deviation between a live field magnitude and the fitted radius.
    pub max_deviation: f32,
}

crate::const_default!(MagCalib => {
    capacity: MAG_SAMPLES,
    max_iterations: MAG_MAX_ITERATIONS,
    convergence_delta: MAG_CONVERGENCE_DELTA,
    max_deviation: MAG_MAX_DEVIATION,
});

impl MagCalib {
    /// Configure the number of samples collected before fitting.
    pub fn capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Configure the maximum number of refinement iterations.
    pub fn max_iterations(self, max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Configure the squared step length at which refinement stops.
    pub fn convergence_delta(self, convergence_delta: f32) -> Self {
        Self {
            convergence_delta,
            ..self
        }
    }

    /// Configure the accepted relative deviation used by the validity check.
    pub fn max_deviation(self, max_deviation: f32) -> Self {
        Self {
            max_deviation,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        let delta_ok = self.convergence_delta.is_finite() && self.convergence_delta >= 0.0;
        let deviation_ok = self.max_deviation.is_finite() && self.max_deviation >= 0.0;

        if self.capacity == 0 || !delta_ok || !deviation_ok {
            return Err(CalibrationError::InvalidConfig);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_consts() {
        let config = MagCalib::default();
        assert_eq!(config.capacity, 3000);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.convergence_delta, 0.0);
        assert_eq!(config.max_deviation, 0.3);
        assert_eq!(Ok(()), config.validate());
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let config = MagCalib::default();
        assert_eq!(
            Err(CalibrationError::InvalidConfig),
            config.capacity(0).validate()
        );
        assert_eq!(
            Err(CalibrationError::InvalidConfig),
            config.convergence_delta(-1.0).validate()
        );
        assert_eq!(
            Err(CalibrationError::InvalidConfig),
            config.max_deviation(f32::NAN).validate()
        );
    }
}
