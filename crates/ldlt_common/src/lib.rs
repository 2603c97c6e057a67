//! Common definitions shared by the LDLT accelerator driver and its tools.
//!
//! This crate holds the hardware contract between the host core and the
//! LDLT RoCC accelerator: the custom instruction encoding used to reach the
//! accelerator, the status word convention, and the in-memory layout of the
//! command descriptor. Nothing here touches hardware, so the definitions can
//! be checked on any host.

#![cfg_attr(not(test), no_std)]

/// RoCC instruction encoding for the LDLT accelerator.
///
/// The accelerator sits behind the RoCC interface and is reached through the
/// RISC-V `custom-N` major opcodes. Every request uses the R-type layout with
/// the three RoCC register-usage bits (`xd`, `xs1`, `xs2`) packed into the
/// funct3 slot:
///
/// ```text
///  31      25 24  20 19  15  14   13    12  11   7 6      0
/// | funct7   | rs2  | rs1  | xd | xs1 | xs2 | rd   | opcode |
/// ```
pub mod isa {
    /// Major opcodes reserved for custom extensions.
    ///
    /// A RoCC accelerator is attached to one of the four custom slots. The
    /// numeric discriminant is the slot index used by the C-side helpers,
    /// `major()` returns the 7-bit opcode that lands in bits 6..0.
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CustomOpcode {
        Custom0 = 0,
        Custom1 = 1,
        Custom2 = 2,
        Custom3 = 3,
    }

    impl CustomOpcode {
        /// Returns the 7-bit major opcode for this custom slot.
        pub const fn major(self) -> u32 {
            match self {
                CustomOpcode::Custom0 => 0b000_1011,
                CustomOpcode::Custom1 => 0b010_1011,
                CustomOpcode::Custom2 => 0b101_1011,
                CustomOpcode::Custom3 => 0b111_1011,
            }
        }
    }

    /// Custom slot the LDLT accelerator is wired to.
    pub const LDLT_OPCODE: CustomOpcode = CustomOpcode::Custom0;

    /// Function codes understood by the LDLT accelerator.
    ///
    /// The function code travels in funct7 and selects the request kind.
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Funct {
        /// Start a solve. `rs1` carries the descriptor address, `rd`
        /// receives the initial status word.
        Solve = 0,

        /// Query the accelerator. `rs1` is ignored, `rd` receives the
        /// current status word.
        CheckStatus = 1,
    }

    /// Destination register for the status word (`a0`).
    pub const REG_STATUS: u8 = 10;

    /// Source register for the descriptor address (`a1`).
    pub const REG_DESCRIPTOR: u8 = 11;

    /// A single RoCC request as it is laid out in the instruction stream.
    ///
    /// Only the fields the LDLT protocol needs are exposed. Requests always
    /// write a result (`xd`) and read `rs1` (`xs1`); `rs2` is unused and
    /// encoded as `x0`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RoccInstruction {
        pub opcode: CustomOpcode,
        pub funct: Funct,
        pub rd: u8,
        pub rs1: u8,
    }

    impl RoccInstruction {
        /// Solve request with the status in `a0` and the descriptor in `a1`.
        pub const SOLVE: Self = Self::new(Funct::Solve);

        /// Status-check request with the status in `a0`.
        pub const CHECK_STATUS: Self = Self::new(Funct::CheckStatus);

        /// Builds a request for the LDLT accelerator using the fixed
        /// register assignment of the protocol.
        pub const fn new(funct: Funct) -> Self {
            Self {
                opcode: LDLT_OPCODE,
                funct,
                rd: REG_STATUS,
                rs1: REG_DESCRIPTOR,
            }
        }

        /// Packs the request into a 32-bit instruction word.
        ///
        /// Register numbers are masked to five bits and the function code to
        /// seven, so the result is always a well-formed R-type word.
        pub const fn encode(&self) -> u32 {
            const XD: u32 = 1 << 14;
            const XS1: u32 = 1 << 13;

            ((self.funct as u32 & 0x7F) << 25)
                | ((self.rs1 as u32 & 0x1F) << 15)
                | XD
                | XS1
                | ((self.rd as u32 & 0x1F) << 7)
                | self.opcode.major()
        }
    }
}

/// Status word convention shared by the submit and status-check requests.
///
/// Zero always means the accelerator is idle, which after a submission also
/// means the command finished. Everything else is "not done yet" unless the
/// driver is configured to treat a range of values as fault codes.
pub mod status {
    /// Accelerator idle or last command completed.
    pub const STATUS_IDLE: u64 = 0;

    /// Generic busy value reported while a command is running.
    pub const STATUS_BUSY: u64 = 1;

    /// Start of the range reserved for fault reports.
    ///
    /// The accelerator is not required to use it. Drivers that opt in treat
    /// any status at or above this value as a terminal fault rather than as
    /// "still busy".
    pub const FAULT_BASE: u64 = 1 << 63;
}

/// In-memory command descriptor read by the accelerator.
pub mod descriptor {
    /// Required alignment, in bytes, of the matrix and vector buffers.
    ///
    /// The accelerator issues 128-bit memory accesses against both buffers.
    pub const BUFFER_ALIGN: usize = 16;

    /// Size of the descriptor as seen by the accelerator.
    pub const DESCRIPTOR_SIZE: usize = 40;

    /// Raw descriptor layout: five 64-bit words in fixed order.
    ///
    /// The accelerator fetches this structure by address after a solve
    /// request, so it must stay at the same location until the status word
    /// returns to zero.
    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Descriptor {
        /// Address of the row-major `rows x cols` matrix of `f64`.
        pub matrix_addr: u64,

        /// Address of the `rows`-element right-hand side, overwritten with
        /// the solution.
        pub vector_addr: u64,

        /// Number of matrix rows.
        pub rows: u64,

        /// Number of matrix columns.
        pub cols: u64,

        /// Reserved. Must be zero.
        pub flags: u64,
    }

    impl Descriptor {
        /// Returns the descriptor as the word sequence the accelerator reads.
        pub const fn to_words(&self) -> [u64; 5] {
            [
                self.matrix_addr,
                self.vector_addr,
                self.rows,
                self.cols,
                self.flags,
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::descriptor::{DESCRIPTOR_SIZE, Descriptor};
    use super::isa::{CustomOpcode, Funct, RoccInstruction};
    use core::mem::offset_of;

    #[test]
    fn solve_word_matches_reference_encoding() {
        assert_eq!(RoccInstruction::SOLVE.encode(), 0x0005_E50B);
    }

    #[test]
    fn check_status_word_differs_only_in_funct() {
        let solve = RoccInstruction::SOLVE.encode();
        let check = RoccInstruction::CHECK_STATUS.encode();
        assert_eq!(check, 0x0205_E50B);
        assert_eq!(solve ^ check, 1 << 25);
    }

    #[test]
    fn custom_slots_use_distinct_major_opcodes() {
        let slots = [
            CustomOpcode::Custom0,
            CustomOpcode::Custom1,
            CustomOpcode::Custom2,
            CustomOpcode::Custom3,
        ];
        for (i, a) in slots.iter().enumerate() {
            assert_eq!(a.major() & 0b11, 0b11);
            for b in &slots[i + 1..] {
                assert_ne!(a.major(), b.major());
            }
        }
    }

    #[test]
    fn other_slot_changes_low_bits_only() {
        let insn = RoccInstruction {
            opcode: CustomOpcode::Custom3,
            ..RoccInstruction::new(Funct::Solve)
        };
        assert_eq!(insn.encode() & !0x7F, RoccInstruction::SOLVE.encode() & !0x7F);
        assert_eq!(insn.encode() & 0x7F, 0b111_1011);
    }

    #[test]
    fn descriptor_layout_is_five_words() {
        assert_eq!(size_of::<Descriptor>(), DESCRIPTOR_SIZE);
        assert_eq!(offset_of!(Descriptor, matrix_addr), 0);
        assert_eq!(offset_of!(Descriptor, vector_addr), 8);
        assert_eq!(offset_of!(Descriptor, rows), 16);
        assert_eq!(offset_of!(Descriptor, cols), 24);
        assert_eq!(offset_of!(Descriptor, flags), 32);
    }

    #[test]
    fn descriptor_words_keep_field_order() {
        let desc = Descriptor {
            matrix_addr: 0x1000,
            vector_addr: 0x2000,
            rows: 3,
            cols: 4,
            flags: 0,
        };
        assert_eq!(desc.to_words(), [0x1000, 0x2000, 3, 4, 0]);
    }
}
