//! Program store and working memory.
//!
//! The program store holds 64 KiB of instruction bytes and is fixed once
//! loaded. Working memory is 256 bytes, addressed by an 8-bit register
//! value, so every RAM access is in range by construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capacity of the program store in bytes (2^16).
pub const PROGRAM_SIZE: usize = 1 << 16;

/// Capacity of working memory in bytes (2^8).
pub const RAM_SIZE: usize = 1 << 8;

/// Read-only instruction bytes, zero-padded to [`PROGRAM_SIZE`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProgramStore")]
pub struct ProgramStore {
    bytes: Vec<u8>,
    /// Number of bytes supplied at load time.
    loaded: usize,
}

impl ProgramStore {
    /// Build a store from a program image, left-aligned.
    pub fn new(image: &[u8]) -> Result<Self, CapacityError> {
        if image.len() > PROGRAM_SIZE {
            return Err(CapacityError {
                size: image.len(),
                capacity: PROGRAM_SIZE,
            });
        }

        let mut bytes = vec![0; PROGRAM_SIZE];
        bytes[..image.len()].copy_from_slice(image);

        Ok(Self {
            bytes,
            loaded: image.len(),
        })
    }

    /// Fetch the byte at a program pointer.
    ///
    /// Negative pointers are rejected rather than reinterpreted.
    #[inline]
    pub fn fetch(&self, pointer: i16) -> Result<u8, MemoryError> {
        usize::try_from(pointer)
            .ok()
            .and_then(|index| self.bytes.get(index).copied())
            .ok_or(MemoryError::PointerOutOfRange(pointer as i32))
    }

    /// Read a byte by absolute index. Out-of-range reads return 0.
    pub fn read(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    /// Number of bytes supplied when the store was built.
    pub fn loaded_len(&self) -> usize {
        self.loaded
    }

    /// The loaded program image, without padding.
    pub fn image(&self) -> &[u8] {
        &self.bytes[..self.loaded]
    }

    /// The whole store, padding included.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Serialized form of a [`ProgramStore`], checked before use.
#[derive(Deserialize)]
struct RawProgramStore {
    bytes: Vec<u8>,
    loaded: usize,
}

impl TryFrom<RawProgramStore> for ProgramStore {
    type Error = MemoryError;

    fn try_from(raw: RawProgramStore) -> Result<Self, Self::Error> {
        if raw.bytes.len() != PROGRAM_SIZE {
            return Err(MemoryError::BadLength {
                region: "program store",
                expected: PROGRAM_SIZE,
                found: raw.bytes.len(),
            });
        }
        if raw.loaded > PROGRAM_SIZE {
            return Err(MemoryError::BadLength {
                region: "loaded program",
                expected: PROGRAM_SIZE,
                found: raw.loaded,
            });
        }

        Ok(Self {
            bytes: raw.bytes,
            loaded: raw.loaded,
        })
    }
}

impl std::fmt::Debug for ProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramStore")
            .field("loaded", &self.loaded)
            .field("capacity", &PROGRAM_SIZE)
            .finish()
    }
}

/// 256 bytes of read/write working memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRam")]
pub struct Ram {
    cells: Vec<u8>,
}

impl Ram {
    /// Create zeroed memory.
    pub fn new() -> Self {
        Self {
            cells: vec![0; RAM_SIZE],
        }
    }

    #[inline]
    pub fn read(&self, addr: u8) -> u8 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u8, value: u8) {
        self.cells[addr as usize] = value;
    }

    /// Clear all cells to zero.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }

    /// Dump a range of cells (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = start.saturating_add(count).min(RAM_SIZE);
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct RawRam {
    cells: Vec<u8>,
}

impl TryFrom<RawRam> for Ram {
    type Error = MemoryError;

    fn try_from(raw: RawRam) -> Result<Self, Self::Error> {
        if raw.cells.len() != RAM_SIZE {
            return Err(MemoryError::BadLength {
                region: "working memory",
                expected: RAM_SIZE,
                found: raw.cells.len(),
            });
        }
        Ok(Self { cells: raw.cells })
    }
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|cell| **cell != 0).count();

        f.debug_struct("Ram")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &RAM_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program pointer does not index the program store.
    #[error("program pointer {0} out of range (0-{})", PROGRAM_SIZE - 1)]
    PointerOutOfRange(i32),

    /// Restored memory does not have its fixed size.
    #[error("{region} has invalid size {found} (expected {expected})")]
    BadLength {
        region: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Program image does not fit in the program store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("program size {size} exceeds capacity {capacity}")]
pub struct CapacityError {
    pub size: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_is_zero_padded() {
        let store = ProgramStore::new(&[0x10, 0xFF]).unwrap();

        assert_eq!(store.fetch(0).unwrap(), 0x10);
        assert_eq!(store.fetch(1).unwrap(), 0xFF);
        assert_eq!(store.fetch(2).unwrap(), 0x00);
        assert_eq!(store.as_slice().len(), PROGRAM_SIZE);
        assert_eq!(store.image(), &[0x10, 0xFF]);
    }

    #[test]
    fn test_store_capacity() {
        assert!(ProgramStore::new(&vec![0xAA; PROGRAM_SIZE]).is_ok());
        assert_eq!(
            ProgramStore::new(&vec![0xAA; PROGRAM_SIZE + 1]),
            Err(CapacityError {
                size: PROGRAM_SIZE + 1,
                capacity: PROGRAM_SIZE,
            })
        );
    }

    #[test]
    fn test_negative_pointer_rejected() {
        let store = ProgramStore::new(&[]).unwrap();
        assert_eq!(store.fetch(-1), Err(MemoryError::PointerOutOfRange(-1)));
        assert_eq!(store.fetch(i16::MAX).unwrap(), 0);
    }

    #[test]
    fn test_restore_rejects_short_ram() {
        let err = serde_json::from_str::<Ram>(r#"{"cells":[0]}"#).unwrap_err();
        assert!(err.to_string().contains("working memory has invalid size 1"));

        let ram: Ram = serde_json::from_str(&serde_json::to_string(&Ram::new()).unwrap()).unwrap();
        assert_eq!(ram.as_slice().len(), RAM_SIZE);
    }

    #[test]
    fn test_restore_rejects_bad_program_store() {
        let store = ProgramStore::new(&[0x10, 0xFF]).unwrap();
        let mut value = serde_json::to_value(&store).unwrap();

        value["loaded"] = serde_json::json!(70_000);
        assert!(serde_json::from_value::<ProgramStore>(value.clone()).is_err());

        value["loaded"] = serde_json::json!(2);
        value["bytes"] = serde_json::json!([0x10, 0xFF]);
        assert!(serde_json::from_value::<ProgramStore>(value).is_err());

        let json = serde_json::to_string(&store).unwrap();
        let restored: ProgramStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.image(), &[0x10, 0xFF]);
    }

    #[test]
    fn test_ram_read_write() {
        let mut ram = Ram::new();
        ram.write(0xFF, 42);

        assert_eq!(ram.read(0xFF), 42);
        assert_eq!(ram.dump(0xFE, 10), vec![(0xFE, 0), (0xFF, 42)]);

        ram.clear();
        assert_eq!(ram.read(0xFF), 0);
    }
}
