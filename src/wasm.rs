//! WebAssembly bindings for the emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::cpu::{Cpu, Step};
use crate::program::parse_program;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a CPU from hex digit pairs.
    #[wasm_bindgen(constructor)]
    pub fn new(hex: &str) -> Result<WasmCpu, JsError> {
        let cpu = Cpu::from_hex(hex)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(Self { cpu })
    }

    /// Replace the program with commented program-file text.
    #[wasm_bindgen]
    pub fn load_program(&mut self, source: &str) -> Result<usize, JsError> {
        let image = parse_program(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.cpu = Cpu::from_bytes(&image)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(image.len())
    }

    /// Step one cycle. Returns a description of what ran.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let step = self.cpu.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(match step {
            Step::Executed(instr) => instr.to_string(),
            Step::Immediate { sel, value } => format!("r{} := {:02X}", sel, value),
            Step::Halted(e) => format!("halted: {}", e),
        })
    }

    /// Run at most `max_cycles` cycles. Returns cycles executed.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u32, JsError> {
        let summary = self.cpu.run_limited(max_cycles as u64)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(summary.cycles as u32)
    }

    /// Reset to the post-load state.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get the program pointer.
    #[wasm_bindgen]
    pub fn pointer(&self) -> i16 {
        self.cpu.pointer()
    }

    /// Get a register value (0 for an out-of-range index).
    #[wasm_bindgen]
    pub fn register(&self, index: usize) -> u8 {
        self.cpu.register(index)
    }

    /// Get all sixteen registers.
    #[wasm_bindgen]
    pub fn registers(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(&self.cpu.regs.dump()[..])
    }

    /// Get all 256 bytes of working memory.
    #[wasm_bindgen]
    pub fn ram(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.cpu.ram.as_slice())
    }

    /// Get machine state as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}
