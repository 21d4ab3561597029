//! Program images: hex text in, bytes out.
//!
//! This module provides:
//! - The hex-pair codec used to build a program store from text
//! - A plain-text program file format with comments

pub mod file;
pub mod hex;

pub use file::{load_program_file, parse_program, save_program_file, ProgramFileError};
pub use hex::{decode_hex, encode_hex, HexError};

/// Sample program: compare two numbers and store the larger one in RAM.
///
/// Run it with a pointer limit; it ends on a run of NOP padding.
pub const SAMPLE_PROGRAM: &str = concat!(
    "10", "FF", // r0 := 0xFF
    "11", "F0", // r1 := 0xF0
    "C5",       // r5 := 1 if r0 > r1
    "16", "0E", // r6 := address of the store
    "17", "0D", // r7 := address of the else branch
    "D5",       // skip the jump when r5 is odd
    "E7",       // jump to else
    "40",       // r3 <-> r0
    "E6",       // jump to store
    "41",       // else: r3 <-> r1
    "33",       // ram[r2] := r3
    "00",
);
