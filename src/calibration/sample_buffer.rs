use alloc::vec::Vec;
use nalgebra::Vector3;

use crate::errors::CalibrationError;

/// Fixed-capacity, write-once storage of raw magnetometer samples.
///
/// The three axes are kept in separate, index-aligned buffers, so sample `i`
/// is `(x[i], y[i], z[i])`. Memory for the full capacity is reserved up front
/// and released when the buffer is dropped.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    capacity: usize,
}

impl SampleBuffer {
    /// Allocate room for `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, CalibrationError> {
        Ok(Self {
            x: Self::allocate(capacity)?,
            y: Self::allocate(capacity)?,
            z: Self::allocate(capacity)?,
            capacity,
        })
    }

    fn allocate(capacity: usize) -> Result<Vec<f32>, CalibrationError> {
        let mut axis = Vec::new();
        axis.try_reserve_exact(capacity)
            .map_err(|_| CalibrationError::OutOfMemory)?;
        Ok(axis)
    }

    /// Store `sample` if there is room left. Returns `true` if the buffer is full afterwards.
    pub fn append(&mut self, sample: [f32; 3]) -> bool {
        if !self.is_full() {
            let [x, y, z] = sample;
            self.x.push(x);
            self.y.push(y);
            self.z.push(z);
        }
        self.is_full()
    }

    /// Number of samples stored so far.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Collection progress in percent, `0..=100`.
    pub fn progress(&self) -> u8 {
        if self.capacity == 0 {
            return 0;
        }
        (self.len() * 100 / self.capacity) as u8
    }

    /// Iterate over the stored samples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.x
            .iter()
            .zip(self.y.iter())
            .zip(self.z.iter())
            .map(|((&x, &y), &z)| Vector3::new(x, y, z))
    }
}
