//! Command descriptor encoding.
//!
//! Turns caller-owned matrix and vector buffers into the five-word
//! descriptor the accelerator fetches by address. All shape and alignment
//! checks happen here, before any instruction is issued, so a malformed
//! request never reaches the hardware.

use crate::{DescriptorFault, LdltError};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use ldlt_common::descriptor::{BUFFER_ALIGN, Descriptor};

/// Wrapper that places its contents on a 16-byte boundary.
///
/// Matches the accelerator's alignment requirement, so fixed-size buffers
/// can live in static or stack storage:
///
/// ```
/// use ldlt_core::descriptor::Aligned;
///
/// let b = Aligned([1.0f64, 2.0, 3.0, 4.0]);
/// assert_eq!(b.as_ptr() as usize % 16, 0);
/// ```
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aligned<T>(pub T);

impl<T> Deref for Aligned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Aligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// A validated descriptor tied to the buffers it points at.
///
/// Holds exclusive borrows of both buffers for `'b`: the accelerator may
/// write the solution into the vector and its factors into the matrix, so
/// neither may be touched while a command built from this descriptor is in
/// flight.
#[derive(Debug)]
pub struct CommandDescriptor<'b> {
    raw: Descriptor,
    _buffers: PhantomData<(&'b mut [f64], &'b mut [f64])>,
}

impl<'b> CommandDescriptor<'b> {
    /// Encodes a solve of the `rows x cols` row-major `matrix` against
    /// `vector`.
    ///
    /// # Errors
    ///
    /// Returns `LdltError::InvalidDescriptor` when a dimension is zero,
    /// `rows * cols` overflows, a buffer is shorter than the shape requires,
    /// or a buffer is not aligned to `BUFFER_ALIGN`.
    pub fn encode(
        matrix: &'b mut [f64],
        vector: &'b mut [f64],
        rows: usize,
        cols: usize,
    ) -> Result<Self, LdltError> {
        if rows == 0 || cols == 0 {
            return Err(DescriptorFault::ZeroDimension.into());
        }
        let elements = rows
            .checked_mul(cols)
            .ok_or(DescriptorFault::DimensionOverflow)?;
        if matrix.len() < elements {
            return Err(DescriptorFault::MatrixTooShort {
                required: elements,
                actual: matrix.len(),
            }
            .into());
        }
        if vector.len() < rows {
            return Err(DescriptorFault::VectorTooShort {
                required: rows,
                actual: vector.len(),
            }
            .into());
        }

        let matrix_addr = matrix.as_mut_ptr() as usize;
        let vector_addr = vector.as_mut_ptr() as usize;
        for addr in [matrix_addr, vector_addr] {
            if addr & (BUFFER_ALIGN - 1) != 0 {
                return Err(DescriptorFault::Misaligned { addr }.into());
            }
        }

        Ok(Self {
            raw: Descriptor {
                matrix_addr: matrix_addr as u64,
                vector_addr: vector_addr as u64,
                rows: rows as u64,
                cols: cols as u64,
                flags: 0,
            },
            _buffers: PhantomData,
        })
    }

    /// The five-word layout exactly as the accelerator will read it.
    pub fn raw(&self) -> &Descriptor {
        &self.raw
    }

    /// Address handed to the accelerator in `rs1`.
    pub fn as_ptr(&self) -> *const Descriptor {
        &self.raw
    }

    /// Matrix rows, also the length of the solution.
    pub fn rows(&self) -> usize {
        self.raw.rows as usize
    }

    /// Matrix columns.
    pub fn cols(&self) -> usize {
        self.raw.cols as usize
    }
}
