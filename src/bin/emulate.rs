//! Command-line runner
//!
//! Loads an ELF executable into a flat memory image and runs a hart
//! over it, streaming the console host's output. `--debug` drops into
//! an interactive prompt that single-steps the hart.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_num::maybe_hex;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rvcore::elf_utils::load_elf;
use rvcore::hart::memory::{Memory, Wordsize};
use rvcore::hart::registers::abi;
use rvcore::hart::Hart;
use rvcore::host::ConsoleHost;
use rvcore::isa::IsaConfig;
use rvcore::trap::Exit;
use rvcore::xlen::{Rv32, Rv64, Xlen};

/// Emulate a RISC-V processor running a flat user-mode image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the input executable file
    input: PathBuf,

    /// Register and address width (32 or 64)
    #[arg(long, default_value_t = 32)]
    xlen: u32,

    /// Size of the flat memory image in bytes (use 0x prefix for
    /// hexadecimal)
    #[arg(long, value_parser = maybe_hex::<u64>, default_value = "0x400000")]
    memory_size: u64,

    /// Initial stack pointer; defaults to the top of memory
    #[arg(long, value_parser = maybe_hex::<u64>)]
    stack_pointer: Option<u64>,

    /// Raise misaligned-access faults on unaligned loads and stores
    #[arg(long)]
    strict_align: bool,

    /// Single step through instructions at an interactive prompt
    #[arg(short, long)]
    debug: bool,

    /// Print this 8-word memory region at each debug step (use 0x
    /// prefix for hexadecimal)
    #[arg(short, long, value_parser = maybe_hex::<u64>)]
    memory: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match args.xlen {
        32 => run::<Rv32>(&args),
        64 => run::<Rv64>(&args),
        other => {
            eprintln!("unsupported xlen {other}: expected 32 or 64");
            ExitCode::FAILURE
        }
    }
}

fn run<X: Xlen>(args: &Args) -> ExitCode {
    let mut memory = Memory::new(args.memory_size as usize);
    let entry = match load_elf(&mut memory, &args.input) {
        Ok(entry) => entry,
        Err(e) => {
            eprintln!("error loading {}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let mut config = IsaConfig::default();
    config.enforce_alignment = args.strict_align;

    let stack_pointer = args.stack_pointer.unwrap_or(args.memory_size - 4);
    let mut hart: Hart<X> = Hart::new(&mut memory, config);
    hart.set_pc(entry);
    hart.registers_mut().write(abi::SP, stack_pointer);

    let mut host = ConsoleHost::<X>::new();
    let exit = if args.debug {
        match debug_loop(&mut hart, &mut host, args) {
            Some(exit) => exit,
            // The prompt was quit before the hart terminated
            None => return ExitCode::SUCCESS,
        }
    } else {
        run_to_completion(&mut hart, &mut host)
    };

    match exit {
        Exit::Halted { status } => {
            if status == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(status.min(255) as u8)
            }
        }
        fault => {
            eprintln!("{fault}");
            ExitCode::FAILURE
        }
    }
}

fn run_to_completion<X: Xlen>(hart: &mut Hart<X>, host: &mut ConsoleHost<X>) -> Exit {
    loop {
        let done = hart.step(host);
        let output = host.flush_output();
        if !output.is_empty() {
            print!("{output}");
            std::io::stdout().flush().ok();
        }
        if let Some(exit) = done {
            return exit;
        }
    }
}

fn print_registers<X: Xlen>(hart: &Hart<X>) {
    println!("pc = 0x{:x}", hart.pc());
    for n in 0..32 {
        let value = hart.registers().read(n);
        if value != 0 {
            println!("x{n} = 0x{value:x}");
        }
    }
}

fn print_memory<X: Xlen>(hart: &Hart<X>, base: u64) {
    for n in 0..8 {
        let addr = base + 4 * n;
        match hart.memory().read(addr, Wordsize::Word) {
            Ok(word) => println!("{addr:x}: {word:08x}"),
            Err(e) => {
                println!("{addr:x}: {e}");
                break;
            }
        }
    }
}

/// Interactive stepping. Returns the exit report, or None if the user
/// quit the prompt first.
fn debug_loop<X: Xlen>(
    hart: &mut Hart<X>,
    host: &mut ConsoleHost<X>,
    args: &Args,
) -> Option<Exit> {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("could not open debug prompt: {e}");
            return Some(run_to_completion(hart, host));
        }
    };
    println!("debug prompt: step (s, default), regs (r), mem <addr> (m), continue (c), quit (q)");
    loop {
        let line = match editor.readline("(emulate) ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return None,
            Err(e) => {
                eprintln!("readline error: {e}");
                return None;
            }
        };
        editor.add_history_entry(line.as_str()).ok();
        let mut words = line.split_whitespace();
        match words.next().unwrap_or("s") {
            "s" | "step" => {
                let done = hart.step(host);
                let output = host.flush_output();
                if !output.is_empty() {
                    print!("{output}");
                }
                println!("pc = 0x{:x}", hart.pc());
                if let Some(base) = args.memory {
                    print_memory(hart, base);
                }
                if let Some(exit) = done {
                    println!("{exit}");
                    return Some(exit);
                }
            }
            "r" | "regs" => print_registers(hart),
            "m" | "mem" => match words.next().map(|w| maybe_hex::<u64>(w)) {
                Some(Ok(base)) => print_memory(hart, base),
                _ => println!("usage: m <addr>"),
            },
            "c" | "continue" => {
                let exit = run_to_completion(hart, host);
                println!("{exit}");
                return Some(exit);
            }
            "q" | "quit" => return None,
            other => println!("unknown command {other:?}"),
        }
    }
}
