//! Heap buffers meeting the accelerator's alignment requirement.
//!
//! `Vec<f64>` only guarantees 8-byte alignment, while the accelerator needs
//! both operands on a 16-byte boundary. `AlignedBuf` allocates with an
//! explicit `Layout` so runtime-sized systems can be handed to the channel.

use anyhow::{Result, anyhow};
use ldlt_common::descriptor::BUFFER_ALIGN;
use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Zero-initialized, fixed-length `f64` buffer aligned to `BUFFER_ALIGN`.
pub struct AlignedBuf {
    ptr: NonNull<f64>,
    len: usize,
}

impl AlignedBuf {
    /// Allocates `len` zeroed elements.
    ///
    /// # Errors
    ///
    /// Fails if `len` is zero, the size overflows, or the allocator returns
    /// null.
    pub fn zeroed(len: usize) -> Result<Self> {
        let layout = Self::layout(len)?;
        // SAFETY: `layout` has a nonzero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<f64>())
            .ok_or_else(|| anyhow!("failed to allocate {} bytes", layout.size()))?;
        Ok(Self { ptr, len })
    }

    /// Allocates a buffer holding a copy of `values`.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let mut buf = Self::zeroed(values.len())?;
        buf.copy_from_slice(values);
        Ok(buf)
    }

    fn layout(len: usize) -> Result<Layout> {
        if len == 0 {
            return Err(anyhow!("buffer length must be nonzero"));
        }
        let size = len
            .checked_mul(size_of::<f64>())
            .ok_or_else(|| anyhow!("buffer of {len} elements overflows"))?;
        Ok(Layout::from_size_align(size, BUFFER_ALIGN)?)
    }
}

impl Deref for AlignedBuf {
    type Target = [f64];
    fn deref(&self) -> &[f64] {
        // SAFETY: `ptr` owns `len` initialized elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [f64] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // The layout was valid when the buffer was allocated.
        if let Ok(layout) = Self::layout(self.len) {
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), layout) };
        }
    }
}

// SAFETY: `AlignedBuf` uniquely owns its allocation, like `Vec<f64>`.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_aligned_and_zeroed() {
        for len in [1, 3, 16, 257] {
            let buf = AlignedBuf::zeroed(len).unwrap();
            assert_eq!(buf.as_ptr() as usize % BUFFER_ALIGN, 0);
            assert_eq!(buf.len(), len);
            assert!(buf.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn from_slice_copies_values() {
        let buf = AlignedBuf::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(&*buf, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(AlignedBuf::zeroed(0).is_err());
    }
}
