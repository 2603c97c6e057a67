//! Host-side driver for the LDLT RoCC accelerator.
//!
//! This crate builds command descriptors, hands them to the accelerator
//! through its custom instructions, and polls the status word until the
//! solve completes, with memory fences bracketing the exchange. The
//! accelerator itself is reached through the `Accelerator` trait so the same
//! channel drives real hardware on RISC-V and a simulated unit elsewhere.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Accelerator strategy trait.
///
/// Abstracts the two requests the accelerator understands (solve and
/// status-check) plus the fence used around them. Implemented by the real
/// RoCC backend and by the simulator.
pub mod accelerator;

/// Command/status channel.
///
/// Drives one command at a time through submit, bounded polling, and
/// completion, enforcing the fence discipline and rejecting overlapping
/// submissions.
pub mod channel;

/// Descriptor encoder.
///
/// Validates caller buffers and dimensions and produces the raw descriptor
/// the accelerator reads by address.
pub mod descriptor;

/// Software LDLT factorization and solve.
///
/// Reference kernel executed by the simulated accelerator in place of the
/// hardware datapath.
#[cfg(any(test, feature = "sim"))]
pub mod ldlt;

/// Real accelerator backend issuing RoCC instructions.
pub mod rocc;

/// Simulated accelerator with an event trace.
#[cfg(any(test, feature = "sim"))]
pub mod sim;

use core::fmt;

/// Reasons a descriptor cannot be built from the caller's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFault {
    /// `rows` or `cols` is zero.
    ZeroDimension,

    /// `rows * cols` does not fit in the address space.
    DimensionOverflow,

    /// The matrix buffer holds fewer than `rows * cols` elements.
    MatrixTooShort { required: usize, actual: usize },

    /// The vector buffer holds fewer than `rows` elements.
    VectorTooShort { required: usize, actual: usize },

    /// A buffer does not start on a 16-byte boundary.
    Misaligned { addr: usize },
}

/// Error types returned by the LDLT driver.
///
/// Every failure is surfaced to the caller; the driver never retries on its
/// own. Only `AcceleratorTimeout` leaves a command outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdltError {
    /// The descriptor could not be encoded from the supplied buffers.
    ///
    /// No instruction was issued and the accelerator never saw the buffers.
    InvalidDescriptor(DescriptorFault),

    /// A command is already outstanding on this channel, or the accelerator
    /// reported busy when probed before submission.
    ChannelBusy,

    /// The status word stayed nonzero for the whole polling budget.
    ///
    /// The command is still considered in flight. The channel refuses new
    /// submissions until a later `await_completion` observes zero.
    AcceleratorTimeout { polls: u32 },

    /// The accelerator reported a status inside the configured fault range.
    ///
    /// The command is retired; the contents of the buffers are unspecified.
    AcceleratorFault(u64),
}

impl fmt::Display for DescriptorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorFault::ZeroDimension => write!(f, "rows and cols must be nonzero"),
            DescriptorFault::DimensionOverflow => write!(f, "rows * cols overflows"),
            DescriptorFault::MatrixTooShort { required, actual } => {
                write!(f, "matrix holds {actual} elements, {required} required")
            }
            DescriptorFault::VectorTooShort { required, actual } => {
                write!(f, "vector holds {actual} elements, {required} required")
            }
            DescriptorFault::Misaligned { addr } => {
                write!(f, "buffer at {addr:#x} is not 16-byte aligned")
            }
        }
    }
}

impl fmt::Display for LdltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LdltError::InvalidDescriptor(fault) => write!(f, "invalid descriptor: {fault}"),
            LdltError::ChannelBusy => write!(f, "accelerator channel busy"),
            LdltError::AcceleratorTimeout { polls } => {
                write!(f, "accelerator did not complete after {polls} status checks")
            }
            LdltError::AcceleratorFault(code) => write!(f, "accelerator fault {code:#x}"),
        }
    }
}

impl core::error::Error for LdltError {}

impl From<DescriptorFault> for LdltError {
    fn from(fault: DescriptorFault) -> Self {
        LdltError::InvalidDescriptor(fault)
    }
}
