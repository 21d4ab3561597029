//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::{CapacityError, MemoryError, ProgramStore, Ram};
use crate::cpu::registers::{
    Registers, MOVE_TARGET, OPERAND_1, OPERAND_2, RAM_ADDRESS, REGISTER_COUNT,
};
use crate::program::hex::{decode_hex, HexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU fetched a byte with an unassigned opcode.
    Halted,
}

/// What the next fetched byte will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    /// Decode the byte as an instruction.
    Opcode,
    /// Store the byte verbatim into register `sel` (second half of LOAD-IMM).
    Immediate { sel: u8 },
}

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction was decoded and executed.
    Executed(Instruction),
    /// A LOAD-IMM data byte was written to register `sel`.
    Immediate { sel: u8, value: u8 },
    /// The byte did not decode; the CPU is now halted.
    Halted(DecodeError),
}

/// Why a bounded run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Halted,
    CycleLimit,
    PointerLimit,
}

/// Bounds a driver loop. The core never stops on its own except on halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub max_cycles: u64,
    /// Stop before fetching once the pointer reaches this value.
    pub pointer_limit: Option<i16>,
}

impl RunLimits {
    pub fn cycles(max_cycles: u64) -> Self {
        Self {
            max_cycles,
            pointer_limit: None,
        }
    }
}

/// Outcome and length of a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub cycles: u64,
}

/// Serializable view of the machine state, without the program store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub pointer: i16,
    pub cycles: u64,
    pub fetch: FetchState,
    pub registers: [u8; REGISTER_COUNT],
    pub ram: Vec<u8>,
}

/// The emulated CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Instruction bytes, fixed after load.
    pub program: ProgramStore,
    /// Working memory.
    pub ram: Ram,
    /// Register file and program pointer.
    pub regs: Registers,
    /// Current execution state.
    pub state: CpuState,
    /// Cycle count (for profiling).
    pub cycles: u64,
    fetch: FetchState,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Build a CPU from a string of hex digit pairs.
    pub fn from_hex(hex: &str) -> Result<Self, LoadError> {
        let image = decode_hex(hex)?;
        Self::from_bytes(&image)
    }

    /// Build a CPU from a raw program image.
    pub fn from_bytes(image: &[u8]) -> Result<Self, LoadError> {
        let program = ProgramStore::new(image)?;
        log::debug!("loaded program of {} bytes", image.len());

        Ok(Self {
            program,
            ram: Ram::new(),
            regs: Registers::new(),
            state: CpuState::Running,
            cycles: 0,
            fetch: FetchState::Opcode,
            last_instr: None,
        })
    }

    /// Reset everything except the loaded program.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.ram.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.fetch = FetchState::Opcode;
        self.last_instr = None;
    }

    /// Execute one cycle.
    ///
    /// Returns `Ok(false)` when the fetched byte had an unassigned opcode.
    /// Halting is sticky: every later call fails with
    /// [`CpuError::NotRunning`] until [`Cpu::reset`]. Otherwise errors only
    /// when the pointer would leave the program store.
    pub fn cycle(&mut self) -> Result<bool, CpuError> {
        self.step().map(|step| !matches!(step, Step::Halted(_)))
    }

    /// Execute one cycle, reporting what it did.
    ///
    /// Same contract as [`Cpu::cycle`].
    pub fn step(&mut self) -> Result<Step, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pointer = self.regs.pointer;
        let byte = self.fetch_byte()?;

        if let FetchState::Immediate { sel } = self.fetch {
            self.regs.write(sel, byte);
            self.fetch = FetchState::Opcode;
            self.cycles += 1;
            log::trace!("{:04X}: {:02X}  r{} := {:#04x}", pointer, byte, sel, byte);
            return Ok(Step::Immediate { sel, value: byte });
        }

        let instr = match decode::decode(byte) {
            Ok(instr) => instr,
            Err(e) => {
                log::debug!("halted at {:04X}: {}", pointer, e);
                self.state = CpuState::Halted;
                return Ok(Step::Halted(e));
            }
        };

        log::trace!("{:04X}: {:02X}  {}", pointer, byte, instr);
        self.execute(instr)?;

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(Step::Executed(instr))
    }

    /// Run for at most `max_cycles` cycles.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<RunSummary, CpuError> {
        self.run_until(RunLimits::cycles(max_cycles))
    }

    /// Run until halt or until one of `limits` is reached.
    pub fn run_until(&mut self, limits: RunLimits) -> Result<RunSummary, CpuError> {
        self.run_with(limits, |_, _, _| {})
    }

    /// Like [`Cpu::run_until`], calling `on_step` after every cycle with
    /// the pointer the cycle started at.
    pub fn run_with<F>(&mut self, limits: RunLimits, mut on_step: F) -> Result<RunSummary, CpuError>
    where
        F: FnMut(i16, &Step, &Cpu),
    {
        let start_cycles = self.cycles;

        let outcome = loop {
            if self.state == CpuState::Halted {
                break RunOutcome::Halted;
            }
            if limits
                .pointer_limit
                .is_some_and(|limit| self.regs.pointer >= limit)
            {
                break RunOutcome::PointerLimit;
            }
            if self.cycles - start_cycles >= limits.max_cycles {
                log::warn!("stopped after {} cycles without halting", limits.max_cycles);
                break RunOutcome::CycleLimit;
            }
            let pointer = self.regs.pointer;
            let step = self.step()?;
            on_step(pointer, &step, self);
        };

        Ok(RunSummary {
            outcome,
            cycles: self.cycles - start_cycles,
        })
    }

    /// Fetch the byte at the pointer and advance past it.
    fn fetch_byte(&mut self) -> Result<u8, CpuError> {
        let pointer = self.regs.pointer;
        let byte = self.program.fetch(pointer)?;
        self.regs
            .advance_pointer()
            .ok_or(MemoryError::PointerOutOfRange(pointer as i32 + 1))?;
        Ok(byte)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        let sel = instr.sel;
        let regs = &mut self.regs;

        match instr.opcode {
            Opcode::Nop => {}

            Opcode::LoadImm => {
                self.fetch = FetchState::Immediate { sel };
            }

            // ==================== Memory ====================
            Opcode::LoadMem => {
                let value = self.ram.read(regs.read(RAM_ADDRESS));
                regs.write(sel, value);
            }

            Opcode::StoreMem => {
                self.ram.write(regs.read(RAM_ADDRESS), regs.read(sel));
            }

            Opcode::SwapMove => regs.swap(MOVE_TARGET, sel),

            // ==================== Bit operations ====================
            Opcode::Shl => regs.write(sel, regs.read(sel) << 1),

            Opcode::Not => regs.write(sel, regs.read(sel) ^ 0xFF),

            Opcode::Or => regs.write(sel, regs.read(OPERAND_1) | regs.read(OPERAND_2)),

            Opcode::And => regs.write(sel, regs.read(OPERAND_1) & regs.read(OPERAND_2)),

            Opcode::Xor => regs.write(sel, regs.read(OPERAND_1) ^ regs.read(OPERAND_2)),

            // ==================== Arithmetic ====================
            Opcode::Add => {
                let sum = regs.read(OPERAND_1).wrapping_add(regs.read(OPERAND_2));
                regs.write(sel, sum);
            }

            Opcode::Sub => {
                let diff = regs.read(OPERAND_1).wrapping_sub(regs.read(OPERAND_2));
                regs.write(sel, diff);
            }

            // Only ever sets the flag; a false compare leaves r[sel] alone.
            Opcode::Cmp => {
                if regs.read(OPERAND_1) > regs.read(OPERAND_2) {
                    regs.write(sel, 0x01);
                }
            }

            // ==================== Control Flow ====================
            Opcode::SkipIfOdd => {
                if regs.read(sel) & 0x01 == 0x01 {
                    let pointer = regs.pointer;
                    regs.advance_pointer()
                        .ok_or(MemoryError::PointerOutOfRange(pointer as i32 + 1))?;
                }
            }

            Opcode::Jump => {
                let target = regs.jump_target(sel);
                let target = i16::try_from(target)
                    .map_err(|_| MemoryError::PointerOutOfRange(target as i32))?;
                regs.jump(target);
            }
        }

        Ok(())
    }

    /// Read a register by index, 0 if the index is out of range.
    pub fn register(&self, index: usize) -> u8 {
        self.regs.get(index)
    }

    /// Index of the next byte to fetch.
    pub fn pointer(&self) -> i16 {
        self.regs.pointer
    }

    /// What the next fetched byte will be used for.
    pub fn fetch_state(&self) -> FetchState {
        self.fetch
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Capture registers, pointer and RAM.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            pointer: self.regs.pointer,
            cycles: self.cycles,
            fetch: self.fetch,
            registers: self.regs.dump(),
            ram: self.ram.as_slice().to_vec(),
        }
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("fetch", &self.fetch)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur while building a CPU from a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("decode error: {0}")]
    Decode(#[from] HexError),

    #[error("capacity error: {0}")]
    Capacity(#[from] CapacityError),
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("bounds error: {0}")]
    Bounds(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::memory::PROGRAM_SIZE;
    use crate::cpu::registers::JUMP_HIGH;
    use crate::program::SAMPLE_PROGRAM;

    fn load(hex: &str) -> Cpu {
        Cpu::from_hex(hex).unwrap()
    }

    /// Load r0 and r1, then run `tail`.
    fn with_operands(a: u8, b: u8, tail: &str) -> Cpu {
        load(&format!("10{:02X}11{:02X}{}", a, b, tail))
    }

    fn cycles(cpu: &mut Cpu, n: usize) {
        for _ in 0..n {
            assert!(cpu.cycle().unwrap());
        }
    }

    #[test]
    fn test_initial_state() {
        let cpu = load("");

        assert_eq!(cpu.pointer(), 0);
        assert_eq!(cpu.fetch_state(), FetchState::Opcode);
        assert!(cpu.regs.dump().iter().all(|r| *r == 0));
        assert!(cpu.ram.as_slice().iter().all(|c| *c == 0));
        assert!(cpu.is_running());
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(Cpu::from_hex("1"), Err(LoadError::Decode(HexError::OddLength(1)))));
        assert!(matches!(Cpu::from_hex("XY"), Err(LoadError::Decode(_))));
        assert_eq!(
            Cpu::from_bytes(&vec![0; PROGRAM_SIZE + 1]).unwrap_err(),
            LoadError::Capacity(CapacityError {
                size: PROGRAM_SIZE + 1,
                capacity: PROGRAM_SIZE,
            })
        );
    }

    #[test]
    fn test_load_imm_takes_two_cycles() {
        let mut cpu = load("17AB");

        assert!(cpu.cycle().unwrap());
        assert_eq!(cpu.fetch_state(), FetchState::Immediate { sel: 7 });
        assert_eq!(cpu.register(7), 0);

        assert!(cpu.cycle().unwrap());
        assert_eq!(cpu.fetch_state(), FetchState::Opcode);
        assert_eq!(cpu.register(7), 0xAB);
        assert_eq!(cpu.pointer(), 2);
    }

    #[test]
    fn test_immediate_byte_is_never_decoded() {
        // 0xF0 would halt if decoded.
        let mut cpu = load("12F0");
        cycles(&mut cpu, 2);

        assert_eq!(cpu.register(2), 0xF0);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_load_and_store_mem() {
        // r2 := 0x40, r9 := 0x5A, ram[r2] := r9, r6 := ram[r2]
        let mut cpu = load("1240195A3926");
        cycles(&mut cpu, 6);

        assert_eq!(cpu.ram.read(0x40), 0x5A);
        assert_eq!(cpu.register(6), 0x5A);
    }

    #[test]
    fn test_swap_move_is_a_swap() {
        let mut cpu = load("1311192249");
        cycles(&mut cpu, 5);
        assert_eq!((cpu.register(3), cpu.register(9)), (0x22, 0x11));

        let mut cpu = load("131119224949");
        cycles(&mut cpu, 6);
        assert_eq!((cpu.register(3), cpu.register(9)), (0x11, 0x22));
    }

    #[test]
    fn test_shl_drops_overflow() {
        let mut cpu = load("15C15555");
        cycles(&mut cpu, 4);
        assert_eq!(cpu.register(5), 0x04);
    }

    #[test]
    fn test_not() {
        let mut cpu = load("15A56566");
        cycles(&mut cpu, 4);
        assert_eq!(cpu.register(5), 0x5A);
        assert_eq!(cpu.register(6), 0xFF);
    }

    #[test]
    fn test_logic_ops() {
        let mut cpu = with_operands(0b1100, 0b1010, "778899");
        cycles(&mut cpu, 7);

        assert_eq!(cpu.register(7), 0b1110);
        assert_eq!(cpu.register(8), 0b1000);
        assert_eq!(cpu.register(9), 0b0110);
    }

    #[test]
    fn test_add_sub_wrap() {
        let mut cpu = with_operands(0xFF, 0x02, "AABB");
        cycles(&mut cpu, 6);

        assert_eq!(cpu.register(0xA), 0x01);
        assert_eq!(cpu.register(0xB), 0xFD);
    }

    #[test]
    fn test_cmp_sets_when_greater() {
        let mut cpu = with_operands(0x05, 0x04, "C5");
        cycles(&mut cpu, 5);
        assert_eq!(cpu.register(5), 0x01);
    }

    #[test]
    fn test_cmp_leaves_destination_unchanged_when_not_greater() {
        for (a, b) in [(0x04, 0x05), (0x05, 0x05)] {
            let mut cpu = with_operands(a, b, "157EC5");
            cycles(&mut cpu, 7);
            assert_eq!(cpu.register(5), 0x7E, "r0={a:#x} r1={b:#x}");
        }
    }

    #[test]
    fn test_skip_if_odd() {
        let mut cpu = load("1501D5");
        cycles(&mut cpu, 3);
        assert_eq!(cpu.pointer(), 4);

        let mut cpu = load("1502D5");
        cycles(&mut cpu, 3);
        assert_eq!(cpu.pointer(), 3);
    }

    #[test]
    fn test_skipped_byte_is_not_executed() {
        // Skips the halting 0xF0 and reaches the NOP behind it.
        let mut cpu = load("1501D5F000");
        cycles(&mut cpu, 4);
        assert_eq!(cpu.pointer(), 5);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_jump() {
        let mut cpu = load("14011702E7");
        cycles(&mut cpu, 5);
        assert_eq!(cpu.pointer(), 0x0102);
    }

    #[test]
    fn test_jump_beyond_signed_range_fails() {
        let mut cpu = load("14801700E7");
        cycles(&mut cpu, 4);

        assert_eq!(
            cpu.cycle(),
            Err(CpuError::Bounds(MemoryError::PointerOutOfRange(0x8000)))
        );
        assert_eq!(cpu.pointer(), 5);
    }

    #[test]
    fn test_pointer_overflow_fails() {
        let mut cpu = load("");
        cpu.regs.pointer = i16::MAX;

        assert!(matches!(cpu.cycle(), Err(CpuError::Bounds(_))));
        assert_eq!(cpu.pointer(), i16::MAX);
    }

    #[test]
    fn test_unassigned_opcode_halts() {
        let mut cpu = load("1501F3");
        cycles(&mut cpu, 2);

        assert!(!cpu.cycle().unwrap());
        assert!(cpu.is_halted());
        assert_eq!(cpu.register(3), 0);
        assert_eq!(cpu.cycle(), Err(CpuError::NotRunning(CpuState::Halted)));
        assert_eq!(cpu.step(), Err(CpuError::NotRunning(CpuState::Halted)));
        assert_eq!(cpu.pointer(), 3);

        cpu.reset();
        assert!(cpu.is_running());
    }

    #[test]
    fn test_compare_trace() {
        let mut cpu = load("10FF11F0C5");
        let summary = cpu.run_limited(5).unwrap();

        assert_eq!(summary.outcome, RunOutcome::CycleLimit);
        assert_eq!(cpu.register(5), 0x01);
        assert_eq!(cpu.last_instruction(), Some(decode::decode(0xC5).unwrap()));
    }

    #[test]
    fn test_run_until_halt() {
        let mut cpu = load("10FF11F0C5F0");
        let summary = cpu.run_limited(100).unwrap();

        assert_eq!(summary, RunSummary { outcome: RunOutcome::Halted, cycles: 5 });
        assert_eq!(cpu.register(5), 0x01);
    }

    #[test]
    fn test_sample_program() {
        let mut cpu = load(SAMPLE_PROGRAM);
        let summary = cpu
            .run_until(RunLimits {
                max_cycles: 10_000,
                pointer_limit: Some(100),
            })
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::PointerLimit);
        assert_eq!(cpu.pointer(), 100);
        assert_eq!(cpu.register(MOVE_TARGET as usize), 0xFF);
        assert_eq!(cpu.register(OPERAND_1 as usize), 0x00);
        assert_eq!(cpu.ram.read(0), 0xFF);
    }

    #[test]
    fn test_reset_keeps_program() {
        let mut cpu = load("1701");
        cpu.run_limited(2).unwrap();
        cpu.reset();

        assert_eq!(cpu.register(7), 0);
        assert_eq!(cpu.pointer(), 0);
        assert_eq!(cpu.program.image(), &[0x17, 0x01]);
    }

    #[test]
    fn test_snapshot_json() {
        let mut cpu = load("1A2A");
        cpu.run_limited(2).unwrap();

        let json = serde_json::to_string(&cpu.snapshot()).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.registers[0xA], 0x2A);
        assert_eq!(back.pointer, 2);
    }

    #[test]
    fn test_encoded_program() {
        let program = [
            encode(&Instruction::new(Opcode::LoadImm, JUMP_HIGH)),
            0x00,
            encode(&Instruction::new(Opcode::LoadImm, 6)),
            0x06,
            encode(&Instruction::new(Opcode::Jump, 6)),
            0xF0,
            encode(&Instruction::new(Opcode::Not, 6)),
        ];
        let mut cpu = Cpu::from_bytes(&program).unwrap();
        cycles(&mut cpu, 6);

        assert_eq!(cpu.register(6), 0xF9);
    }

    #[test]
    fn test_halt_step_is_copy() {
        let mut cpu = load("F7");
        let step = cpu.step().unwrap();
        let copy = step;

        assert_eq!(step, Step::Halted(DecodeError::InvalidOpcode(0xF7)));
        assert_eq!(copy, step);
    }

    #[test]
    fn test_restored_cpu_with_bad_ram_is_rejected() {
        let mut value = serde_json::to_value(load("124025")).unwrap();
        value["ram"]["cells"] = serde_json::json!([0]);

        assert!(serde_json::from_value::<Cpu>(value).is_err());
    }

    #[test]
    fn test_restored_cpu_runs() {
        let mut cpu = load("12401977392625");
        cpu.run_limited(4).unwrap();

        let json = serde_json::to_string(&cpu).unwrap();
        let mut restored: Cpu = serde_json::from_str(&json).unwrap();
        restored.run_limited(3).unwrap();

        assert_eq!(restored.ram.read(0x40), 0x77);
        assert_eq!(restored.register(6), 0x77);
        assert_eq!(restored.register(5), 0x77);
    }

    #[test]
    fn test_run_with_reports_each_step() {
        let mut cpu = load("10FF11F0C5F0");
        let mut seen = Vec::new();
        let summary = cpu
            .run_with(RunLimits::cycles(100), |pointer, step, _| seen.push((pointer, *step)))
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Halted);
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[1], (1, Step::Immediate { sel: 0, value: 0xFF }));
        assert_eq!(seen[4], (4, Step::Executed(Instruction::new(Opcode::Cmp, 5))));
        assert_eq!(seen[5], (5, Step::Halted(DecodeError::InvalidOpcode(0xF0))));
    }

    #[test]
    fn test_run_with_stops_at_pointer_limit() {
        let mut cpu = load("");
        let mut calls = 0;
        let summary = cpu
            .run_with(
                RunLimits { max_cycles: 100, pointer_limit: Some(3) },
                |_, _, _| calls += 1,
            )
            .unwrap();

        assert_eq!(summary, RunSummary { outcome: RunOutcome::PointerLimit, cycles: 3 });
        assert_eq!(calls, 3);
    }
}
