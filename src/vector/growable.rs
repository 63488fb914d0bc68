//! Append-only per-frame arrays with amortised growth.
//!
//! Capacity grows to `max(len + n, floor) + capacity / 2` whenever an
//! allocation does not fit, never shrinks, and survives [`GrowableBuffer::reset`].

use crate::error::{CrateResult, RenderError};

pub const TEXTURE_FLOOR: usize = 4;
pub const CALL_FLOOR: usize = 128;
pub const PATH_FLOOR: usize = 128;
pub const UNIFORM_FLOOR: usize = 128;
pub const PIPELINE_FLOOR: usize = 128;
pub const VERTEX_FLOOR: usize = 4096;

/// Growth target for a buffer of `capacity` that must hold `required` elements
#[inline]
pub fn grown_capacity(capacity: usize, required: usize, floor: usize) -> usize {
    required.max(floor) + capacity / 2
}

#[derive(Debug, Clone)]
pub struct GrowableBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    floor: usize,
    what: &'static str,
}

impl<T: Copy + Default> GrowableBuffer<T> {
    pub fn new(what: &'static str, floor: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
            floor,
            what,
        }
    }

    /// Extend by `n` default elements and return the offset of the first one.
    pub fn allocate(&mut self, n: usize) -> CrateResult<usize> {
        let offset = self.items.len();
        let required = offset.checked_add(n).ok_or(RenderError::HostAllocation {
            what: self.what,
            requested: n,
        })?;

        if required > self.capacity {
            let target = grown_capacity(self.capacity, required, self.floor);
            self.items
                .try_reserve_exact(target - offset)
                .map_err(|_| RenderError::HostAllocation {
                    what: self.what,
                    requested: n,
                })?;
            self.capacity = target;
        }

        self.items.resize(required, T::default());
        Ok(offset)
    }

    /// Append `values` and return the offset of the first one.
    pub fn extend_from_slice(&mut self, values: &[T]) -> CrateResult<usize> {
        let offset = self.allocate(values.len())?;
        self.items[offset..].copy_from_slice(values);
        Ok(offset)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Drop everything past `len`; used to roll back a partially recorded call.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
}
