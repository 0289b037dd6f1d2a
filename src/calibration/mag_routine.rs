use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{sample_buffer::SampleBuffer, sens3d::MagCalibration, sphere_fit::SphereFit, MagCalib};
use crate::{
    errors::{CalibrationError, MagCalError},
    params::{MagParams, ParamStore},
};

const ID: &str = "mag_calib";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagCalState {
    /// No calibration is in progress and no sample buffer is held.
    Idle,
    /// Samples are being collected.
    Collecting,
    /// The buffer filled up and the sphere has been fitted.
    Complete,
}

/// Drives a single magnetometer hard-iron calibration.
///
/// The session is started, fed one raw sample per sensor tick, and fits a
/// sphere to the collected samples the moment the buffer fills up. Ending the
/// session releases the samples and persists the result.
///
/// ```
/// use magcal::{CalibrationSession, MagCalib, params::ram::RamParams};
///
/// let mut params = RamParams::<8>::new();
/// let mut session = CalibrationSession::from_params(MagCalib::default().capacity(4), &mut params);
///
/// session.start().unwrap();
/// for sample in [[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
///     assert!(!session.update(sample).unwrap());
/// }
/// assert!(session.update([0.0, -1.0, 0.0]).unwrap());
/// assert_eq!(100, session.progress());
///
/// session.end(&mut params).unwrap();
/// ```
#[derive(Debug)]
pub struct CalibrationSession {
    config: MagCalib,
    state: MagCalState,
    buffer: Option<SampleBuffer>,
    calibration: MagCalibration,
}

impl CalibrationSession {
    /// Create an idle session without any prior calibration.
    pub fn new(config: MagCalib) -> Self {
        Self::with_calibration(config, MagCalibration::default())
    }

    /// Create an idle session holding an existing calibration.
    pub fn with_calibration(config: MagCalib, calibration: MagCalibration) -> Self {
        Self {
            config,
            state: MagCalState::Idle,
            buffer: None,
            calibration,
        }
    }

    /// Create an idle session holding the calibration stored in `store`, or the defaults.
    pub fn from_params(config: MagCalib, store: &mut impl ParamStore) -> Self {
        Self::with_calibration(config, MagParams::define(store).into())
    }

    pub fn state(&self) -> MagCalState {
        self.state
    }

    pub fn config(&self) -> &MagCalib {
        &self.config
    }

    /// Allocate the sample buffer and begin collecting.
    pub fn start(&mut self) -> Result<(), CalibrationError> {
        if self.state != MagCalState::Idle {
            return Err(CalibrationError::InvalidState(self.state));
        }

        self.config.validate()?;
        self.buffer = Some(SampleBuffer::new(self.config.capacity)?);
        self.state = MagCalState::Collecting;

        info!(
            "{}: Starting magnetometer calibration, collecting {} samples",
            ID, self.config.capacity
        );

        Ok(())
    }

    /// Feed a raw magnetometer sample.
    ///
    /// Returns `Ok(true)` on the call that fills the buffer, in which case the
    /// sphere fit has run and the new calibration is available.
    pub fn update(&mut self, sample: [f32; 3]) -> Result<bool, CalibrationError> {
        let (MagCalState::Collecting, Some(buffer)) = (self.state, self.buffer.as_mut()) else {
            return Err(CalibrationError::InvalidState(self.state));
        };

        if !buffer.append(sample) {
            return Ok(false);
        }

        let fit = SphereFit::fit(
            buffer.iter(),
            self.config.max_iterations,
            self.config.convergence_delta,
        )
        .ok_or(CalibrationError::NoSamples)?;

        self.calibration = MagCalibration::new(fit.center, fit.radius);
        self.state = MagCalState::Complete;

        info!(
            "{}: Calibration complete after {} iterations, offset: [{}, {}, {}], radius: {}",
            ID, fit.iterations, fit.center.x, fit.center.y, fit.center.z, fit.radius
        );

        if self.calibration.is_uncalibrated() {
            warn!("{}: Fitted calibration is degenerate", ID);
        }

        Ok(true)
    }

    /// The offset found by the completed calibration.
    pub fn offset(&self) -> Result<Vector3<f32>, CalibrationError> {
        match self.state {
            MagCalState::Complete => Ok(self.calibration.offset),
            state => Err(CalibrationError::InvalidState(state)),
        }
    }

    /// The calibration currently held, either loaded or the latest fit.
    pub fn calibration(&self) -> &MagCalibration {
        &self.calibration
    }

    /// Check the held calibration against a live reading.
    pub fn is_valid(&self, sample: [f32; 3]) -> bool {
        self.calibration
            .is_valid_within(sample, self.config.max_deviation)
    }

    /// Sample collection progress in percent.
    pub fn progress(&self) -> u8 {
        self.buffer.as_ref().map_or(0, SampleBuffer::progress)
    }

    /// Release the sample buffer and persist the held calibration.
    ///
    /// Releasing is idempotent. The session is idle afterwards, even if persisting fails.
    pub fn end(&mut self, store: &mut impl ParamStore) -> Result<(), MagCalError> {
        if self.buffer.take().is_some() {
            debug!("{}: Released sample buffer", ID);
        }

        if self.state == MagCalState::Collecting {
            warn!("{}: Calibration ended before all samples were collected", ID);
        }

        self.state = MagCalState::Idle;

        MagParams::from(self.calibration).store(store)?;
        info!("{}: Saved magnetometer calibration", ID);

        Ok(())
    }
}
