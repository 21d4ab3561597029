//! CPU emulation core.
//!
//! This module implements the complete machine:
//! - 64 KiB read-only program store addressed by a signed 16-bit pointer
//! - 256 bytes of working memory addressed through r2
//! - 16 one-byte registers, five with fixed roles
//! - 15 opcodes packed into the high nibble of each instruction byte

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{CapacityError, MemoryError, ProgramStore, Ram, PROGRAM_SIZE, RAM_SIZE};
pub use registers::Registers;
pub use decode::{DecodeError, Instruction, Opcode};
pub use execute::{
    Cpu, CpuError, CpuState, FetchState, LoadError, RunLimits, RunOutcome, RunSummary, Snapshot,
    Step,
};
