//! # Nibble Emulator
//!
//! An emulator for a tiny 8-bit CPU whose instructions are single bytes:
//! the high nibble selects one of 15 operations and the low nibble
//! selects a register.
//!
//! Programs are loaded from hex text into a 64 KiB program store and
//! stepped one cycle at a time. The core never bounds its own run; the
//! caller picks a cycle or pointer limit.

pub mod cpu;
pub mod program;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuState, Instruction, LoadError, Opcode, Registers, RunLimits, RunOutcome};
pub use program::{decode_hex, load_program_file, HexError, ProgramFileError, SAMPLE_PROGRAM};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
