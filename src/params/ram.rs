use heapless::FnvIndexMap;

use super::{Param, ParamIdent, ParamStore};
use crate::errors::ParamError;

/// Volatile parameter store holding up to `N` values in RAM.
///
/// `N` must be a power of two. Saving does not move the values anywhere, it
/// only bumps the generation counter so observers can tell a save happened.
#[derive(Debug, Clone)]
pub struct RamParams<const N: usize> {
    values: FnvIndexMap<ParamIdent, f32, N>,
    generation: usize,
}

impl<const N: usize> Default for RamParams<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamParams<N> {
    pub fn new() -> Self {
        Self {
            values: FnvIndexMap::new(),
            generation: 0,
        }
    }

    /// Number of successful saves so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamIdent, &f32)> + '_ {
        self.values.iter()
    }
}

impl<const N: usize> ParamStore for RamParams<N> {
    fn get(&mut self, param: &Param) -> Result<Option<f32>, ParamError> {
        Ok(self.values.get(&param.ident).copied())
    }

    fn set(&mut self, param: &Param, value: f32) -> Result<(), ParamError> {
        match self.values.insert(param.ident, value) {
            Ok(_) => Ok(()),
            Err(_) => {
                error!(
                    "[params] No room to add parameter {}, supports maximum of {}",
                    param.name, N
                );
                Err(ParamError::StoreFull)
            }
        }
    }

    fn save(&mut self) -> Result<(), ParamError> {
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MAG_OFS_X, MAG_OFS_Y, MAG_OFS_Z};

    #[test]
    fn test_set_get_overwrite() {
        let mut store = RamParams::<4>::new();
        assert_eq!(Ok(None), store.get(&MAG_OFS_X));

        store.set(&MAG_OFS_X, 1.5).unwrap();
        store.set(&MAG_OFS_X, -2.5).unwrap();
        assert_eq!(Ok(Some(-2.5)), store.get(&MAG_OFS_X));
        assert_eq!(1, store.len());
    }

    #[test]
    fn test_full_store() {
        let mut store = RamParams::<2>::new();
        store.set(&MAG_OFS_X, 1.0).unwrap();
        store.set(&MAG_OFS_Y, 2.0).unwrap();
        assert_eq!(Err(ParamError::StoreFull), store.set(&MAG_OFS_Z, 3.0));

        // Existing entries can still be updated
        assert_eq!(Ok(()), store.set(&MAG_OFS_Y, 4.0));
    }
}
