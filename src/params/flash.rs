use core::ops::Range;

use embassy_futures::block_on;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::{
    cache::NoCache,
    map::{fetch_item, store_item, SerializationError},
};

use super::{ram::RamParams, Param, ParamIdent, ParamStore};
use crate::errors::ParamError;

/// Size of the scratch buffer holding one serialized key and value.
const ITEM_BUFFER_LEN: usize = 32;

/// Parameter store backed by a key-value map in NOR flash.
///
/// Values that are `set` are kept in RAM until [`save`](ParamStore::save),
/// which writes them to flash. The async flash operations are driven to
/// completion in place, so a save blocks for the duration of the writes.
pub struct FlashParams<F, const N: usize = 8> {
    flash: F,
    range: Range<u32>,
    cache: NoCache,
    pending: RamParams<N>,
    buffer: [u8; ITEM_BUFFER_LEN],
}

impl<F: NorFlash, const N: usize> FlashParams<F, N> {
    /// Use the `range` of `flash` for parameter storage.
    ///
    /// The range must be aligned to the erase size of the flash and span at least two pages.
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self {
            flash,
            range,
            cache: NoCache::new(),
            pending: RamParams::new(),
            buffer: [0u8; ITEM_BUFFER_LEN],
        }
    }

    /// Number of values set but not yet saved.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Release the underlying flash, dropping any unsaved values.
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash, const N: usize> ParamStore for FlashParams<F, N> {
    fn get(&mut self, param: &Param) -> Result<Option<f32>, ParamError> {
        if let Some(value) = self.pending.get(param)? {
            return Ok(Some(value));
        }

        let item = block_on(fetch_item::<ParamIdent, StoredParam, _>(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            &mut self.buffer,
            &param.ident,
        ))
        .map_err(|err| {
            error!("[params] Error loading {}, maybe storage is tainted?", param.name);
            ParamError::from(err)
        })?;

        Ok(item.map(|StoredParam(value)| value))
    }

    fn set(&mut self, param: &Param, value: f32) -> Result<(), ParamError> {
        self.pending.set(param, value)
    }

    fn save(&mut self) -> Result<(), ParamError> {
        for (ident, value) in self.pending.iter() {
            block_on(store_item::<ParamIdent, StoredParam, _>(
                &mut self.flash,
                self.range.clone(),
                &mut self.cache,
                &mut self.buffer,
                ident,
                &StoredParam(*value),
            ))
            .map_err(|err| {
                error!("[params] Could not save parameter to persistent storage");
                ParamError::from(err)
            })?;
        }

        debug!("[params] Saved {} parameters", self.pending.len());
        self.pending.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
struct StoredParam(f32);

impl sequential_storage::map::Value<'_> for StoredParam {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        match postcard::to_slice(self, buffer) {
            Ok(bytes) => Ok(bytes.len()),
            Err(postcard::Error::SerializeBufferFull) => Err(SerializationError::BufferTooSmall),
            Err(_) => Err(SerializationError::InvalidData),
        }
    }

    fn deserialize_from(buffer: &[u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        postcard::from_bytes(buffer).map_err(|_| SerializationError::InvalidFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MagParams, MAG_OFS_X, MAG_RADIUS};
    use alloc::{vec, vec::Vec};
    use embedded_storage_async::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    const PAGE_SIZE: usize = 1024;
    const RANGE: Range<u32> = 0..(4 * PAGE_SIZE as u32);

    /// NOR flash emulated in RAM: erasing sets bytes to 0xFF and writing can only clear bits.
    struct MemFlash {
        data: Vec<u8>,
        fail_writes: bool,
    }

    impl MemFlash {
        fn new() -> Self {
            Self {
                data: vec![0xFF; 4 * PAGE_SIZE],
                fail_writes: false,
            }
        }
    }

    impl ErrorType for MemFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MemFlash {
        const READ_SIZE: usize = 1;

        async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let src = self
                .data
                .get(start..start + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for MemFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = PAGE_SIZE;

        async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            let (from, to) = (from as usize, to as usize);
            if from % PAGE_SIZE != 0 || to % PAGE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            self.data
                .get_mut(from..to)
                .ok_or(NorFlashErrorKind::OutOfBounds)?
                .fill(0xFF);
            Ok(())
        }

        async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.fail_writes {
                return Err(NorFlashErrorKind::Other);
            }
            let start = offset as usize;
            if start % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            let dst = self
                .data
                .get_mut(start..start + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            for (cell, byte) in dst.iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    #[test]
    fn test_empty_flash_uses_defaults() {
        let mut store = FlashParams::<_>::new(MemFlash::new(), RANGE);
        assert_eq!(Ok(None), store.get(&MAG_RADIUS));
        assert_eq!(MagParams::default(), MagParams::define(&mut store));
    }

    #[test]
    fn test_values_survive_reopen() {
        let params = MagParams {
            offset: [0.12, -0.31, 0.05],
            radius: 0.48,
        };

        let mut store = FlashParams::<_>::new(MemFlash::new(), RANGE);
        params.store(&mut store).unwrap();
        assert_eq!(0, store.num_pending());

        let mut store = FlashParams::<_>::new(store.into_inner(), RANGE);
        assert_eq!(params, MagParams::define(&mut store));
    }

    #[test]
    fn test_latest_save_wins() {
        let mut store = FlashParams::<_>::new(MemFlash::new(), RANGE);
        for value in [1.0, 2.0, 3.0] {
            store.set(&MAG_OFS_X, value).unwrap();
            store.save().unwrap();
        }

        let mut store = FlashParams::<_>::new(store.into_inner(), RANGE);
        assert_eq!(Ok(Some(3.0)), store.get(&MAG_OFS_X));
    }

    #[test]
    fn test_unsaved_values_are_not_persisted() {
        let mut store = FlashParams::<_>::new(MemFlash::new(), RANGE);
        store.set(&MAG_OFS_X, 7.0).unwrap();
        assert_eq!(Ok(Some(7.0)), store.get(&MAG_OFS_X));
        assert_eq!(1, store.num_pending());

        let mut store = FlashParams::<_>::new(store.into_inner(), RANGE);
        assert_eq!(Ok(None), store.get(&MAG_OFS_X));
    }

    #[test]
    fn test_failed_save_keeps_pending() {
        let mut flash = MemFlash::new();
        flash.fail_writes = true;

        let mut store = FlashParams::<_>::new(flash, RANGE);
        store.set(&MAG_RADIUS, 0.5).unwrap();
        assert_eq!(Err(ParamError::Storage), store.save());
        assert_eq!(1, store.num_pending());
    }
}
