//! Software model of the LDLT accelerator.
//!
//! Behaves like the hardware from the channel's point of view: a solve
//! request records the descriptor address and reports busy, and the
//! descriptor is only dereferenced when the configured latency has elapsed,
//! at which point the reference kernel runs against the caller's buffers in
//! place. Every request and fence is appended to a trace so tests can check
//! how the channel orders its accesses.

use crate::accelerator::Accelerator;
use crate::ldlt::{self, KernelError};
use alloc::vec::Vec;
use core::sync::atomic::{Ordering, fence};
use ldlt_common::descriptor::Descriptor;
use ldlt_common::status::{FAULT_BASE, STATUS_BUSY, STATUS_IDLE};

/// Fault reported for a descriptor with `rows != cols`.
pub const FAULT_NOT_SQUARE: u64 = FAULT_BASE | 1;

/// Fault reported when the factorization hits a zero pivot.
pub const FAULT_ZERO_PIVOT: u64 = FAULT_BASE | 2;

/// One observable interaction with the simulated accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// The host issued a fence.
    Fence,

    /// A solve request arrived. `accepted` is false if one was already
    /// running.
    Submit { descriptor: usize, accepted: bool },

    /// The accelerator finished reading and writing the buffers.
    Complete { status: u64 },

    /// A status check returned `status`.
    Check { status: u64 },
}

struct Pending {
    descriptor: *const Descriptor,
    remaining: u32,
}

/// Simulated accelerator driven entirely from the host thread.
pub struct SimAccelerator {
    latency: u32,
    hang: bool,
    pending: Option<Pending>,
    fault: Option<u64>,
    completed: u32,
    trace: Vec<SimEvent>,
}

impl Default for SimAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAccelerator {
    /// An accelerator that completes on the first status check.
    pub fn new() -> Self {
        Self {
            latency: 0,
            hang: false,
            pending: None,
            fault: None,
            completed: 0,
            trace: Vec::new(),
        }
    }

    /// Reports busy for `checks` status checks before completing.
    pub fn with_latency(mut self, checks: u32) -> Self {
        self.latency = checks;
        self
    }

    /// Accepts commands but never completes them.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new()
        }
    }

    /// Every request and fence seen so far, oldest first.
    pub fn trace(&self) -> &[SimEvent] {
        &self.trace
    }

    /// Forgets the recorded events. Pending work and faults are kept.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Number of commands that ran to completion, faulted ones included.
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// True between an accepted solve request and the check that
    /// completes it.
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Reads the descriptor by address and runs the kernel on its buffers.
    ///
    /// # Safety
    ///
    /// `descriptor` must satisfy the contract of `Accelerator::submit`.
    unsafe fn execute(descriptor: *const Descriptor) -> u64 {
        let desc = unsafe { descriptor.read() };
        let rows = desc.rows as usize;
        let cols = desc.cols as usize;
        let (matrix, vector) = unsafe {
            (
                core::slice::from_raw_parts_mut(desc.matrix_addr as *mut f64, rows * cols),
                core::slice::from_raw_parts_mut(desc.vector_addr as *mut f64, rows),
            )
        };

        match ldlt::solve_in_place(matrix, vector, rows, cols) {
            Ok(()) => STATUS_IDLE,
            Err(KernelError::NotSquare { .. }) => FAULT_NOT_SQUARE,
            Err(KernelError::ZeroPivot { .. }) => FAULT_ZERO_PIVOT,
        }
    }
}

impl Accelerator for SimAccelerator {
    unsafe fn submit(&mut self, descriptor: *const Descriptor) -> u64 {
        let accepted = self.pending.is_none();
        self.trace.push(SimEvent::Submit {
            descriptor: descriptor as usize,
            accepted,
        });
        if accepted {
            self.fault = None;
            self.pending = Some(Pending {
                descriptor,
                remaining: self.latency,
            });
        }
        STATUS_BUSY
    }

    fn check_status(&mut self) -> u64 {
        let status = match self.pending.take() {
            None => self.fault.unwrap_or(STATUS_IDLE),
            Some(pending) if self.hang => {
                self.pending = Some(pending);
                STATUS_BUSY
            }
            Some(mut pending) if pending.remaining > 0 => {
                pending.remaining -= 1;
                self.pending = Some(pending);
                STATUS_BUSY
            }
            Some(pending) => {
                // SAFETY: the submitter guarantees the descriptor and its
                // buffers stay valid until this check reports completion.
                let status = unsafe { Self::execute(pending.descriptor) };
                self.completed += 1;
                if status != STATUS_IDLE {
                    self.fault = Some(status);
                }
                self.trace.push(SimEvent::Complete { status });
                status
            }
        };
        self.trace.push(SimEvent::Check { status });
        status
    }

    fn fence(&mut self) {
        self.trace.push(SimEvent::Fence);
        fence(Ordering::SeqCst);
    }
}
