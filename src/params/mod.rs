//! Named scalar parameters and the stores that keep them.
//!
//! Parameters are identified by a zero-padded 16 byte name, the same format
//! MAVLink uses for `param_id`, so they can be exposed to a ground station as is.

pub mod flash;
pub mod ram;

use nalgebra::Vector3;

use crate::{
    calibration::sens3d::MagCalibration, consts::PARAM_IDENT_LEN, errors::ParamError,
};

/// Raw identifier of a parameter.
pub type ParamIdent = [u8; PARAM_IDENT_LEN];

/// A named scalar parameter with its default value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub ident: ParamIdent,
    pub default: f32,
}

impl Param {
    /// Define a parameter.
    ///
    /// # Panics
    ///
    /// If `name` is longer than 16 bytes. Used in a `const` this fails the build instead.
    pub const fn new(name: &'static str, default: f32) -> Self {
        let bytes = name.as_bytes();
        assert!(
            bytes.len() <= PARAM_IDENT_LEN,
            "Parameter names are limited to 16 bytes"
        );

        let mut ident = [0u8; PARAM_IDENT_LEN];
        let mut i = 0;
        while i < bytes.len() {
            ident[i] = bytes[i];
            i += 1;
        }

        Self {
            name,
            ident,
            default,
        }
    }
}

pub const MAG_OFS_X: Param = Param::new("MAG_OFS_X", 0.0);
pub const MAG_OFS_Y: Param = Param::new("MAG_OFS_Y", 0.0);
pub const MAG_OFS_Z: Param = Param::new("MAG_OFS_Z", 0.0);
pub const MAG_RADIUS: Param = Param::new("MAG_RADIUS", 0.0);

/// Storage of named scalar parameters.
///
/// Values written with [`set`](ParamStore::set) are only guaranteed to
/// survive a restart once [`save`](ParamStore::save) returns successfully.
pub trait ParamStore {
    /// Get the value of `param`, or `None` if it has never been set.
    fn get(&mut self, param: &Param) -> Result<Option<f32>, ParamError>;

    /// Set the value of `param`.
    fn set(&mut self, param: &Param, value: f32) -> Result<(), ParamError>;

    /// Persist all values set so far.
    fn save(&mut self) -> Result<(), ParamError>;

    /// Get the value of `param`, falling back to its default.
    fn get_or_default(&mut self, param: &Param) -> f32 {
        match self.get(param) {
            Ok(Some(value)) => value,
            Ok(None) => param.default,
            Err(_) => {
                error!(
                    "[params] Could not load {}, using default value {}",
                    param.name, param.default
                );
                param.default
            }
        }
    }
}

/// The four persisted scalars of a magnetometer calibration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagParams {
    pub offset: [f32; 3],
    pub radius: f32,
}

impl MagParams {
    /// Load the calibration parameters from `store`, using defaults for any that are missing.
    pub fn define(store: &mut impl ParamStore) -> Self {
        Self {
            offset: [
                store.get_or_default(&MAG_OFS_X),
                store.get_or_default(&MAG_OFS_Y),
                store.get_or_default(&MAG_OFS_Z),
            ],
            radius: store.get_or_default(&MAG_RADIUS),
        }
    }

    /// Write the calibration parameters to `store` and save them.
    pub fn store(&self, store: &mut impl ParamStore) -> Result<(), ParamError> {
        let [x, y, z] = self.offset;
        store.set(&MAG_OFS_X, x)?;
        store.set(&MAG_OFS_Y, y)?;
        store.set(&MAG_OFS_Z, z)?;
        store.set(&MAG_RADIUS, self.radius)?;
        store.save()
    }
}

impl From<MagCalibration> for MagParams {
    fn from(calib: MagCalibration) -> Self {
        Self {
            offset: calib.offset.into(),
            radius: calib.radius,
        }
    }
}

impl From<MagParams> for MagCalibration {
    fn from(params: MagParams) -> Self {
        MagCalibration::new(Vector3::from(params.offset), params.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::ram::RamParams;
    use super::*;

    #[test]
    fn test_ident_is_zero_padded() {
        let mut expected = [0u8; 16];
        expected[..10].copy_from_slice(b"MAG_RADIUS");
        assert_eq!(expected, MAG_RADIUS.ident);
    }

    #[test]
    fn test_define_uses_defaults() {
        let mut store = RamParams::<8>::new();
        store.set(&MAG_OFS_Y, 4.0).unwrap();

        let params = MagParams::define(&mut store);
        assert_eq!([0.0, 4.0, 0.0], params.offset);
        assert_eq!(0.0, params.radius);
    }

    #[test]
    fn test_store_then_define() {
        let mut store = RamParams::<8>::new();
        let params = MagParams {
            offset: [0.12, -0.31, 0.05],
            radius: 0.48,
        };

        params.store(&mut store).unwrap();
        assert_eq!(1, store.generation());
        assert_eq!(params, MagParams::define(&mut store));
    }

    #[test]
    fn test_calibration_conversion() {
        let calib = MagCalibration::new(Vector3::new(1.0, 2.0, 3.0), 10.0);
        let params = MagParams::from(calib);
        assert_eq!([1.0, 2.0, 3.0], params.offset);
        assert_eq!(calib, MagCalibration::from(params));
    }
}
