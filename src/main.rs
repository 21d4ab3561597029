//! Nibble Emulator - CLI Entry Point
//!
//! Commands:
//! - `nibble-emu run <program>` - Run a program file (or `--hex` string)
//! - `nibble-emu demo` - Run the built-in sample program
//! - `nibble-emu debug <program>` - Interactive debugger
//! - `nibble-emu pack <hex>` - Write a hex string out as a program file
//! - `nibble-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

#[derive(Parser)]
#[command(name = "nibble-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for a tiny 8-bit CPU with nibble-encoded opcodes")]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or hits a limit
    Run {
        /// Path to the program file, or hex digits with --hex
        program: String,
        /// Treat PROGRAM as an inline hex string
        #[arg(long)]
        hex: bool,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Stop once the program pointer reaches this address
        #[arg(short, long)]
        pointer_limit: Option<i16>,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in sample program
    Demo,
    /// Interactive debugger
    Debug {
        /// Path to the program file
        program: String,
        /// Treat PROGRAM as an inline hex string
        #[arg(long)]
        hex: bool,
    },
    /// Write hex digits out as a commented program file
    Pack {
        /// Program as hex digit pairs
        hex: String,
        /// Output program file
        #[arg(short, long)]
        output: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = SimpleLogger::new().with_level(cli.log_level).init() {
        eprintln!("❌ Failed to initialize logging: {}", e);
    }

    match cli.command {
        Some(Commands::Run { program, hex, max_cycles, pointer_limit, trace, json }) => {
            let image = load_image(&program, hex);
            run_program(&image, max_cycles, pointer_limit, trace, json);
        }
        Some(Commands::Demo) => {
            run_demo();
        }
        Some(Commands::Debug { program, hex }) => {
            let image = load_image(&program, hex);
            debug_program(image);
        }
        Some(Commands::Pack { hex, output }) => {
            pack_program(&hex, &output);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("Nibble Emulator v0.1.0");
            println!("An emulator for a tiny 8-bit CPU");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Read a program image from a file, or decode it inline.
fn load_image(program: &str, inline_hex: bool) -> Vec<u8> {
    use nibble::{decode_hex, load_program_file};

    let result = if inline_hex {
        decode_hex(program).map_err(|e| e.to_string())
    } else {
        load_program_file(program).map_err(|e| e.to_string())
    };

    match result {
        Ok(image) => {
            log::info!("loaded {} bytes from {}", image.len(), if inline_hex { "command line" } else { program });
            image
        }
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(image: &[u8], max_cycles: u64, pointer_limit: Option<i16>, trace: bool, json: bool) {
    use nibble::cpu::Step;
    use nibble::{Cpu, RunLimits, RunOutcome};

    let mut cpu = match Cpu::from_bytes(image) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    };

    if !json {
        println!("━━━ Execution ━━━");
    }

    let limits = RunLimits { max_cycles, pointer_limit };
    let summary = cpu.run_with(limits, |pointer, step, cpu| {
        if !trace {
            return;
        }
        match step {
            Step::Halted(e) => println!("{:04X}: {}", pointer, e),
            _ => println!("{:04X}: {:<16} {}", pointer, describe(step), register_line(cpu)),
        }
    });
    let outcome = match summary {
        Ok(summary) => summary.outcome,
        Err(e) => {
            eprintln!("❌ CPU error at pointer {:04X}: {}", cpu.pointer(), e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles:  {}", cpu.cycles);
    println!("Stopped: {:?}", outcome);
    println!("Pointer: {:04X}", cpu.pointer());
    println!("Registers: {}", register_line(&cpu));

    if outcome == RunOutcome::CycleLimit {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

fn describe(step: &nibble::cpu::Step) -> String {
    use nibble::cpu::Step;

    match step {
        Step::Executed(instr) => instr.to_string(),
        Step::Immediate { sel, value } => format!("  r{} := {:02X}", sel, value),
        Step::Halted(e) => e.to_string(),
    }
}

fn register_line(cpu: &nibble::Cpu) -> String {
    cpu.regs
        .dump()
        .iter()
        .map(|r| format!("{:02X}", r))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_demo() {
    use nibble::cpu::registers::MOVE_TARGET;
    use nibble::{Cpu, RunLimits, SAMPLE_PROGRAM};

    println!("━━━ Sample Program ━━━");
    println!("{}", SAMPLE_PROGRAM);
    println!();

    let mut cpu = match Cpu::from_hex(SAMPLE_PROGRAM) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Failed to load sample: {}", e);
            std::process::exit(1);
        }
    };

    let limits = RunLimits {
        max_cycles: 10_000,
        pointer_limit: Some(100),
    };
    match cpu.run_until(limits) {
        Ok(summary) => {
            println!("Stopped: {:?} after {} cycles", summary.outcome, summary.cycles);
            println!("Move register (r3): {}", cpu.register(MOVE_TARGET as usize));
            println!("RAM[0]:             {}", cpu.ram.read(0));
        }
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(image: Vec<u8>) {
    use nibble::run_debugger;

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(image) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_image: Vec<u8>) {
    eprintln!("❌ Debugger not available: built without the `tui` feature");
    std::process::exit(1);
}

fn pack_program(hex: &str, output: &str) {
    use nibble::decode_hex;
    use nibble::program::save_program_file;

    let image = match decode_hex(hex) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Invalid hex: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = save_program_file(output, &image) {
        eprintln!("❌ Failed to save program: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved {} bytes to {}", image.len(), output);
}

fn run_self_test() {
    use nibble::cpu::decode::{decode, encode};
    use nibble::{Cpu, Instruction, LoadError, Opcode};

    println!("━━━ Nibble Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Run a hex program for a fixed number of cycles.
    let run = |hex: &str, cycles: u64| -> Option<Cpu> {
        let mut cpu = Cpu::from_hex(hex).ok()?;
        cpu.run_limited(cycles).ok()?;
        Some(cpu)
    };

    let ok = (0x00..=0xEFu8).all(|b| decode(b).map(|i| encode(&i)) == Ok(b));
    check("Instruction encode/decode", ok);

    check(
        "Odd-length hex rejected",
        matches!(Cpu::from_hex("123"), Err(LoadError::Decode(_))),
    );

    let ok = run("17AB", 2).is_some_and(|cpu| cpu.register(7) == 0xAB);
    check("LOAD-IMM", ok);

    let ok = run("10FF1102AABB", 6)
        .is_some_and(|cpu| cpu.register(0xA) == 0x01 && cpu.register(0xB) == 0xFD);
    check("ADD/SUB wraparound", ok);

    let ok = run("100111021577C5", 7).is_some_and(|cpu| cpu.register(5) == 0x77);
    check("CMP leaves destination on false", ok);

    let ok = run("1501D5", 3).is_some_and(|cpu| cpu.pointer() == 4);
    check("SKIP-IF-ODD", ok);

    let ok = run("14011702E7", 5).is_some_and(|cpu| cpu.pointer() == 0x0102);
    check("JUMP", ok);

    let nop = Instruction::new(Opcode::Nop, 0);
    let ok = Cpu::from_bytes(&[encode(&nop), 0xF0])
        .ok()
        .and_then(|mut cpu| cpu.run_limited(10).ok())
        .is_some_and(|summary| summary.outcome == nibble::RunOutcome::Halted);
    check("Halt on unassigned opcode", ok);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
