//! RoCC backend for the LDLT accelerator.
//!
//! Issues the solve and status-check requests as raw instruction words
//! produced by `ldlt_common::isa`, with the status in `a0` and the
//! descriptor address in `a1`. Only available when building for riscv64
//! with the `rocc` feature; other targets use the simulator.

use ldlt_common::isa::RoccInstruction;

/// Instruction word for a solve request.
pub const SOLVE_WORD: u32 = RoccInstruction::SOLVE.encode();

/// Instruction word for a status-check request.
pub const CHECK_STATUS_WORD: u32 = RoccInstruction::CHECK_STATUS.encode();

// The asm below hard-wires a0/a1; the encoding must agree.
const _: () = assert!(SOLVE_WORD == 0x0005_E50B);
const _: () = assert!(CHECK_STATUS_WORD == 0x0205_E50B);

#[cfg(all(target_arch = "riscv64", feature = "rocc"))]
pub use self::hw::RoccAccelerator;

#[cfg(all(target_arch = "riscv64", feature = "rocc"))]
mod hw {
    use super::{CHECK_STATUS_WORD, SOLVE_WORD};
    use crate::accelerator::Accelerator;
    use core::arch::asm;
    use ldlt_common::descriptor::Descriptor;

    /// Handle to the accelerator attached at `custom-0`.
    ///
    /// Zero-sized. All state lives in the accelerator.
    pub struct RoccAccelerator {
        _private: (),
    }

    impl RoccAccelerator {
        /// # Safety
        ///
        /// The core must have an LDLT accelerator attached to the `custom-0`
        /// slot. Issuing the instructions without one raises an illegal
        /// instruction trap.
        pub unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Accelerator for RoccAccelerator {
        #[inline(always)]
        unsafe fn submit(&mut self, descriptor: *const Descriptor) -> u64 {
            let status: u64;
            // SAFETY: the caller upholds the `Accelerator::submit` contract
            // for `descriptor`.
            unsafe {
                asm!(
                    ".word {word}",
                    word = const SOLVE_WORD,
                    in("a1") descriptor as usize,
                    lateout("a0") status,
                    options(nostack)
                );
            }
            status
        }

        #[inline(always)]
        fn check_status(&mut self) -> u64 {
            let status: u64;
            // SAFETY: the status check reads no host memory; rs1 is ignored.
            unsafe {
                asm!(
                    ".word {word}",
                    word = const CHECK_STATUS_WORD,
                    in("a1") 0usize,
                    lateout("a0") status,
                    options(nostack)
                );
            }
            status
        }

        #[inline(always)]
        fn fence(&mut self) {
            // SAFETY: a full fence only orders memory accesses.
            unsafe {
                asm!("fence rw, rw", options(nostack, preserves_flags));
            }
        }
    }
}
