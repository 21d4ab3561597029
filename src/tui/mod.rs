//! TUI debugger for the emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register file view with reserved roles labelled
//! - Working memory hex dump
//! - Step/run/breakpoint controls
//! - Program view around the pointer

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
