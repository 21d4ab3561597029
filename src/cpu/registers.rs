//! Register file and program pointer.
//!
//! Sixteen one-byte registers, selected by the low nibble of an
//! instruction. Five of them have fixed roles:
//! - r0: first ALU operand
//! - r1: second ALU operand
//! - r2: working memory address
//! - r3: move target (swapped by SWAP-MOVE)
//! - r4: high byte of a jump target

use serde::{Deserialize, Serialize};

/// Number of registers in the file.
pub const REGISTER_COUNT: usize = 16;

/// First ALU operand.
pub const OPERAND_1: u8 = 0;
/// Second ALU operand.
pub const OPERAND_2: u8 = 1;
/// Working memory address.
pub const RAM_ADDRESS: u8 = 2;
/// Target of SWAP-MOVE.
pub const MOVE_TARGET: u8 = 3;
/// High byte of a JUMP target.
pub const JUMP_HIGH: u8 = 4;

/// The register file plus the program pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    file: [u8; REGISTER_COUNT],

    /// Index of the next byte to fetch from the program store.
    pub pointer: i16,
}

impl Registers {
    /// Create a zeroed register file with the pointer at 0.
    pub fn new() -> Self {
        Self {
            file: [0; REGISTER_COUNT],
            pointer: 0,
        }
    }

    /// Reset all registers and the pointer to zero.
    pub fn reset(&mut self) {
        self.file = [0; REGISTER_COUNT];
        self.pointer = 0;
    }

    /// Read a register selected by an instruction nibble.
    #[inline]
    pub fn read(&self, sel: u8) -> u8 {
        self.file[(sel & 0x0F) as usize]
    }

    /// Write a register selected by an instruction nibble.
    #[inline]
    pub fn write(&mut self, sel: u8, value: u8) {
        self.file[(sel & 0x0F) as usize] = value;
    }

    /// Exchange two registers.
    pub fn swap(&mut self, a: u8, b: u8) {
        self.file.swap((a & 0x0F) as usize, (b & 0x0F) as usize);
    }

    /// Read a register by arbitrary index, 0 if out of range.
    pub fn get(&self, index: usize) -> u8 {
        self.file.get(index).copied().unwrap_or(0)
    }

    /// Step the pointer forward by one.
    ///
    /// Returns `None` instead of wrapping past `i16::MAX`.
    pub fn advance_pointer(&mut self) -> Option<i16> {
        let old = self.pointer;
        self.pointer = old.checked_add(1)?;
        Some(old)
    }

    /// Set the pointer to an absolute address.
    pub fn jump(&mut self, target: i16) {
        self.pointer = target;
    }

    /// Assemble a 16-bit target from the jump-high register and `low_sel`.
    pub fn jump_target(&self, low_sel: u8) -> u16 {
        u16::from_be_bytes([self.read(JUMP_HIGH), self.read(low_sel)])
    }

    /// All register values in index order.
    pub fn dump(&self) -> [u8; REGISTER_COUNT] {
        self.file
    }

    /// Short role label for reserved registers.
    pub fn role(index: u8) -> Option<&'static str> {
        match index {
            OPERAND_1 => Some("op1"),
            OPERAND_2 => Some("op2"),
            RAM_ADDRESS => Some("addr"),
            MOVE_TARGET => Some("move"),
            JUMP_HIGH => Some("jmp-hi"),
            _ => None,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
