use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use mod6502_lib::{Config, Cpu, Emulator};
use mod6502_runner::{parse_program, register_instruction_set, reset, AppResult};

/// 6502 program runner
/// Loads a hexadecimal byte text program into the modular emulator, wires the
/// demonstration instruction set and executes the program, reporting the
/// final register state.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct CommandLineArguments {
    /// Program file location ("-" to read from standard input)
    filepath: PathBuf,

    /// Address the program is loaded at and where execution starts
    /// (hexadecimal)
    #[arg(short, long, default_value = "fffc", value_parser = parse_address)]
    program_offset: usize,

    /// Display the register state after each executed instruction
    #[arg(short, long)]
    verbose: bool,
}

fn parse_address(text: &str) -> Result<usize, String> {
    usize::from_str_radix(text.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn read_program_text(filepath: &Path) -> AppResult<String> {
    if filepath == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("could not read standard input")?;

        Ok(text)
    } else {
        fs::read_to_string(filepath)
            .with_context(|| format!("could not read '{}'", filepath.display()))
    }
}

// same window rule as Emulator::run, stepping so every instruction can be
// reported as it retires
fn step_through(
    emulator: &mut Emulator,
    program_offset: usize,
    program_length: usize,
) -> AppResult<()> {
    while emulator
        .registers()
        .command_pointer
        .checked_sub(program_offset)
        .map_or(false, |executed| executed < program_length)
    {
        emulator.exec()?;
        println!("{:?}", emulator.registers());
    }

    Ok(())
}

fn main() -> AppResult<()> {
    let arguments = CommandLineArguments::parse();
    let text = read_program_text(&arguments.filepath)?;
    let program = parse_program(&text)?;

    let mut emulator = Emulator::new(Config::new(arguments.program_offset, reset))?;
    register_instruction_set(&mut emulator);
    emulator
        .load_program(&program)
        .context("could not load the program")?;

    if arguments.verbose {
        step_through(&mut emulator, arguments.program_offset, program.len())?;
    } else {
        emulator.run()?;
    }

    println!("{:?}", emulator.registers());

    Ok(())
}
