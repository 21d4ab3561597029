//! Instruction decoder.
//!
//! Every instruction byte splits into two nibbles:
//! - High nibble: opcode (0x0-0xE; 0xF is unassigned)
//! - Low nibble: register select (`sel`)
//!
//! LOAD-IMM is the only two-byte instruction: the byte after it is raw
//! data and is never decoded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation selected by the high nibble of an instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// No state change.
    Nop = 0x0,
    /// r[sel] := next byte
    LoadImm = 0x1,
    /// r[sel] := ram[r2]
    LoadMem = 0x2,
    /// ram[r2] := r[sel]
    StoreMem = 0x3,
    /// Exchange r3 and r[sel]
    SwapMove = 0x4,
    /// r[sel] := r[sel] << 1, overflow bit lost
    Shl = 0x5,
    /// r[sel] := !r[sel]
    Not = 0x6,
    /// r[sel] := r0 | r1
    Or = 0x7,
    /// r[sel] := r0 & r1
    And = 0x8,
    /// r[sel] := r0 ^ r1
    Xor = 0x9,
    /// r[sel] := r0 + r1, wrapping
    Add = 0xA,
    /// r[sel] := r0 - r1, wrapping
    Sub = 0xB,
    /// r[sel] := 1 if r0 > r1; untouched otherwise
    Cmp = 0xC,
    /// Skip the next byte if r[sel] is odd
    SkipIfOdd = 0xD,
    /// pointer := r4:r[sel]
    Jump = 0xE,
}

impl Opcode {
    /// All assigned opcodes in encoding order.
    pub const ALL: [Opcode; 15] = [
        Opcode::Nop,
        Opcode::LoadImm,
        Opcode::LoadMem,
        Opcode::StoreMem,
        Opcode::SwapMove,
        Opcode::Shl,
        Opcode::Not,
        Opcode::Or,
        Opcode::And,
        Opcode::Xor,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Cmp,
        Opcode::SkipIfOdd,
        Opcode::Jump,
    ];

    /// Look up the opcode for a nibble.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Self::ALL.get(nibble as usize).copied()
    }

    pub fn nibble(self) -> u8 {
        self as u8
    }

    /// Mnemonic used in traces.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::LoadImm => "LOAD-IMM",
            Opcode::LoadMem => "LOAD-MEM",
            Opcode::StoreMem => "STORE-MEM",
            Opcode::SwapMove => "SWAP-MOVE",
            Opcode::Shl => "SHL",
            Opcode::Not => "NOT",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Xor => "XOR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Cmp => "CMP",
            Opcode::SkipIfOdd => "SKIP-IF-ODD",
            Opcode::Jump => "JUMP",
        }
    }
}

/// A decoded instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Register select, 0-15.
    pub sel: u8,
}

impl Instruction {
    pub fn new(opcode: Opcode, sel: u8) -> Self {
        Self {
            opcode,
            sel: sel & 0x0F,
        }
    }

    /// True if the following byte belongs to this instruction.
    pub fn takes_immediate(&self) -> bool {
        self.opcode == Opcode::LoadImm
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} r{}", self.opcode.mnemonic(), self.sel)
    }
}

/// Decode one instruction byte.
pub fn decode(byte: u8) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::from_nibble(byte >> 4).ok_or(DecodeError::InvalidOpcode(byte))?;
    Ok(Instruction::new(opcode, byte & 0x0F))
}

/// Encode an instruction back to its byte.
pub fn encode(instr: &Instruction) -> u8 {
    (instr.opcode.nibble() << 4) | (instr.sel & 0x0F)
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode in byte {0:#04x}")]
    InvalidOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_nibbles() {
        assert_eq!(decode(0xC5).unwrap(), Instruction::new(Opcode::Cmp, 5));
        assert_eq!(decode(0x1F).unwrap(), Instruction::new(Opcode::LoadImm, 15));
        assert_eq!(decode(0x00).unwrap(), Instruction::new(Opcode::Nop, 0));
    }

    #[test]
    fn test_high_nibble_f_is_invalid() {
        for byte in 0xF0..=0xFF {
            assert_eq!(decode(byte), Err(DecodeError::InvalidOpcode(byte)));
        }
    }

    #[test]
    fn test_opcode_table_order() {
        for (nibble, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.nibble() as usize, nibble);
        }
    }

    #[test]
    fn test_every_valid_byte_reencodes() {
        for byte in 0x00..=0xEF {
            assert_eq!(encode(&decode(byte).unwrap()), byte);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::new(Opcode::SkipIfOdd, 5).to_string(), "SKIP-IF-ODD r5");
    }
}
