#![no_std]

extern crate alloc;

// Logging macros for either defmt or log
#[macro_use]
mod logging;

pub mod calibration;
pub mod consts;
pub mod errors;
pub mod params;

// Re-exported for implementors
pub use embedded_storage_async;
pub use heapless;
pub use nalgebra;

pub use calibration::{
    mag_routine::{CalibrationSession, MagCalState},
    sens3d::MagCalibration,
    sphere_fit::SphereFit,
    MagCalib,
};
pub use errors::{CalibrationError, MagCalError, ParamError};
pub use params::{MagParams, Param, ParamStore};

#[macro_export]
macro_rules! const_default {
    ($type:ty => { $($token:tt)+ } ) => {
        impl $crate::ConstDefault for $type {
            const DEFAULT: Self = Self::const_default();
        }

        impl $type {
            pub const fn const_default() -> Self {
                Self { $($token)+ }
            }
        }

        impl Default for $type {
            fn default() -> Self {
                Self::const_default()
            }
        }
    };
}

pub trait ConstDefault {
    const DEFAULT: Self;
}
