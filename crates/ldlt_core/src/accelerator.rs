//! Accelerator strategy trait.
//!
//! The channel only needs two requests from the accelerator: start a solve
//! from a descriptor address, and report the status word. Backends differ in
//! how those requests reach the unit (custom instructions on RISC-V, a model
//! in software for tests and host tools) and in what a fence means for them.

use core::sync::atomic::{Ordering, fence};
use ldlt_common::descriptor::Descriptor;

/// Requests understood by the LDLT accelerator.
pub trait Accelerator {
    /// Issues a solve request carrying `descriptor`'s address and returns
    /// the status word written to `rd`.
    ///
    /// # Safety
    ///
    /// `descriptor` must point to a valid descriptor whose buffers satisfy
    /// the shape and alignment contract. The descriptor and both buffers
    /// must stay at the same address, and must not be accessed by the host,
    /// until a status check returns zero.
    unsafe fn submit(&mut self, descriptor: *const Descriptor) -> u64;

    /// Issues a status-check request and returns the status word.
    fn check_status(&mut self) -> u64;

    /// Full memory fence between host accesses and accelerator accesses.
    ///
    /// The default is a sequentially consistent fence, which on RISC-V
    /// lowers to `fence rw, rw`.
    fn fence(&mut self) {
        fence(Ordering::SeqCst);
    }
}

impl<A: Accelerator + ?Sized> Accelerator for &mut A {
    unsafe fn submit(&mut self, descriptor: *const Descriptor) -> u64 {
        unsafe { (**self).submit(descriptor) }
    }

    fn check_status(&mut self) -> u64 {
        (**self).check_status()
    }

    fn fence(&mut self) {
        (**self).fence()
    }
}
