//! Program files for the emulator.
//!
//! A program file is plain text:
//! - Hex digit pairs, one byte per pair, in address order
//! - Whitespace between pairs is ignored (a pair may not be split)
//! - `;` starts a comment that runs to the end of the line

use crate::program::hex::{decode_hex, encode_hex, HexError};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Parse program text into bytes.
pub fn parse_program(source: &str) -> Result<Vec<u8>, ProgramFileError> {
    let mut bytes = Vec::new();

    for (line_num, line) in source.lines().enumerate() {
        bytes.extend(parse_line(line, line_num + 1)?);
    }

    Ok(bytes)
}

/// Load a program file from disk.
pub fn load_program_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ProgramFileError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ProgramFileError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut bytes = Vec::new();
    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| ProgramFileError::IoError(e.to_string()))?;
        bytes.extend(parse_line(&line, line_num + 1)?);
    }

    log::debug!("loaded {} program bytes from {}", bytes.len(), path.as_ref().display());
    Ok(bytes)
}

/// Save bytes as a program file, eight bytes per line.
pub fn save_program_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), ProgramFileError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ProgramFileError::IoError(e.to_string()))?;

    writeln!(file, "; nibble-emu program, {} bytes", bytes.len())
        .map_err(|e| ProgramFileError::IoError(e.to_string()))?;

    for (row, chunk) in bytes.chunks(8).enumerate() {
        let pairs: Vec<String> = chunk.iter().map(|b| encode_hex(&[*b])).collect();
        writeln!(file, "{} ; {:04X}", pairs.join(" "), row * 8)
            .map_err(|e| ProgramFileError::IoError(e.to_string()))?;
    }

    Ok(())
}

fn parse_line(line: &str, line_num: usize) -> Result<Vec<u8>, ProgramFileError> {
    let code = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };

    let mut bytes = Vec::new();
    for word in code.split_whitespace() {
        let decoded = decode_hex(word).map_err(|source| ProgramFileError::ParseError {
            line: line_num,
            source,
        })?;
        bytes.extend(decoded);
    }

    Ok(bytes)
}

/// Errors that can occur while reading or writing program files.
#[derive(Debug, Clone, Error)]
pub enum ProgramFileError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {source}")]
    ParseError { line: usize, source: HexError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_comments() {
        let source = "\
; load two numbers
10 FF   ; reg 0
11F0    ; reg 1

C5
";
        assert_eq!(parse_program(source).unwrap(), vec![0x10, 0xFF, 0x11, 0xF0, 0xC5]);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse_program("10 FF\n1G\n").unwrap_err();
        match err {
            ProgramFileError::ParseError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_split_pair_rejected() {
        assert!(parse_program("1 0").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("nibble-emu-{}.hex", std::process::id()));
        let program = vec![0x10, 0x0F, 0xE6, 0x00, 0x33, 0x41, 0xD5, 0x16, 0x0E];

        save_program_file(&path, &program).unwrap();
        let loaded = load_program_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, program);
    }
}
