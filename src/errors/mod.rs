use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calibration::mag_routine::MagCalState;

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagCalError {
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    #[error("The operation is not allowed while the session is {0:?}.")]
    InvalidState(MagCalState),
    #[error("The calibration configuration is invalid.")]
    InvalidConfig,
    #[error("The sample buffer could not be allocated.")]
    OutOfMemory,
    #[error("There are no samples to fit a sphere to.")]
    NoSamples,
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamError {
    #[error("No room left in the parameter store.")]
    StoreFull,
    #[error("The persistent storage failed, maybe it is tainted?")]
    Storage,
    #[error("A parameter value could not be serialized or deserialized.")]
    Serialization,
}

impl<S> From<sequential_storage::Error<S>> for ParamError {
    fn from(value: sequential_storage::Error<S>) -> Self {
        match value {
            sequential_storage::Error::FullStorage => ParamError::StoreFull,
            sequential_storage::Error::SerializationError(..) => ParamError::Serialization,
            _ => ParamError::Storage,
        }
    }
}
