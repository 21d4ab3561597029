//! Debugger application state and logic.

use crate::cpu::decode::decode;
use crate::cpu::{Cpu, FetchState, Step};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Breakpoints (by pointer value).
    pub breakpoints: HashSet<i16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// RAM view scroll offset, in rows of 8 bytes.
    pub ram_scroll: usize,
}

/// One row of the program view.
pub struct ProgramLine {
    pub addr: i16,
    pub byte: u8,
    pub text: String,
    pub is_current: bool,
}

impl DebuggerApp {
    /// Create a new debugger around a loaded CPU.
    pub fn new(cpu: Cpu) -> Self {
        Self {
            cpu,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            ram_scroll: 0,
        }
    }

    /// Step one cycle.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pointer = self.cpu.pointer();
        match self.cpu.step() {
            Ok(Step::Executed(instr)) => {
                self.status = format!("{:04X}: {}", pointer, instr);
            }
            Ok(Step::Immediate { sel, value }) => {
                self.status = format!("{:04X}: r{} := {:02X}", pointer, sel, value);
            }
            Ok(Step::Halted(e)) => {
                self.status = format!("Halted at {:04X}: {}", pointer, e);
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.cpu.cycles);
            return;
        }

        let pointer = self.cpu.pointer();
        if self.breakpoints.contains(&pointer) {
            self.running = false;
            self.status = format!("Breakpoint at {:04X}", pointer);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at the current pointer.
    pub fn toggle_breakpoint(&mut self) {
        let pointer = self.cpu.pointer();
        if self.breakpoints.remove(&pointer) {
            self.status = format!("Removed breakpoint at {:04X}", pointer);
        } else {
            self.breakpoints.insert(pointer);
            self.status = format!("Set breakpoint at {:04X}", pointer);
        }
    }

    /// Reset CPU to its post-load state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Program bytes around the pointer.
    ///
    /// Bytes are labelled from the pointer forward, so a LOAD-IMM data
    /// byte is shown as data. Bytes before the pointer are shown raw.
    pub fn program_view(&self, lines: usize) -> Vec<ProgramLine> {
        let pointer = self.cpu.pointer() as i32;
        let start = (pointer - (lines as i32 / 4)).max(0);
        let mut immediate = matches!(self.cpu.fetch_state(), FetchState::Immediate { .. });

        (start..start + lines as i32)
            .filter_map(|addr| i16::try_from(addr).ok())
            .map(|addr| {
                let byte = self.cpu.program.read(addr as usize);
                let is_current = addr as i32 == pointer;
                let text = if (addr as i32) < pointer {
                    String::new()
                } else if immediate {
                    immediate = false;
                    "  data".to_string()
                } else {
                    match decode(byte) {
                        Ok(instr) => {
                            immediate = instr.takes_immediate();
                            instr.to_string()
                        }
                        Err(_) => "???".to_string(),
                    }
                };
                ProgramLine { addr, byte, text, is_current }
            })
            .collect()
    }
}

/// Run the debugger with a program image.
pub fn run_debugger(image: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let cpu = Cpu::from_bytes(&image)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(cpu);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.ram_scroll = app.ram_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            if app.ram_scroll < 31 {
                                app.ram_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
