//! Grapnel command-line front-end.
//!
//! Launches a program under the debugger (or attaches to a running pid)
//! and drives it from a small interactive command loop:
//!
//! ```text
//! $ grapnel ./target
//! grapnel> register read rip
//! grapnel> continue
//! process 12345 stopped with signal SIGTRAP
//! ```
//!
//! The loop is a plain buffered read of stdin; command parsing accepts
//! unambiguous prefixes (`c` for `continue`, `reg` for `register`). Core
//! errors are caught at the command boundary and printed, so a failed
//! command never tears down the session.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use grapnel_core::error::{GrapnelError, Result};
use grapnel_core::process::Process;
use grapnel_core::registers::{
    register_info_by_name, register_infos, RegisterFormat, RegisterInfo, RegisterType, RegisterValue,
};
use grapnel_core::types::ProcessId;
use grapnel_utils::{init_logging, init_logging_with_level, LogFormat, LogLevel};

#[derive(Parser)]
#[command(name = "grapnel", version, about = "A ptrace-based debugger for x86-64 Linux")]
struct Cli
{
    /// Program to launch under the debugger
    #[arg(required_unless_present = "pid", conflicts_with = "pid")]
    program: Option<PathBuf>,

    /// Attach to an already-running process instead of launching one
    #[arg(short, long)]
    pid: Option<i32>,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

fn main()
{
    let cli = Cli::parse();

    let log_result = match cli.log_level {
        Some(level) => init_logging_with_level(level, LogFormat::Pretty),
        None => init_logging(),
    };
    if let Err(e) = log_result {
        eprintln!("Failed to initialize logging: {e}");
        exit(1);
    }

    let process = match start_inferior(&cli) {
        Ok(process) => process,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };

    if let Err(e) = command_loop(process) {
        eprintln!("{e}");
        exit(1);
    }
}

/// Launch or attach per the command line; either way the inferior is
/// stopped when this returns.
fn start_inferior(cli: &Cli) -> Result<Process>
{
    match (&cli.program, cli.pid) {
        (_, Some(pid)) => Process::attach(ProcessId::from(pid)),
        (Some(program), None) => Process::launch(program, true, None),
        (None, None) => unreachable!("clap requires a program or a pid"),
    }
}

/// Prompt-read-dispatch until EOF or `quit`.
fn command_loop(mut process: Process) -> Result<()>
{
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("grapnel> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "q" | "quit" | "exit") {
            break;
        }

        // Core errors surface here and the session continues.
        if let Err(e) = handle_command(&mut process, trimmed) {
            eprintln!("{e}");
        }
    }

    Ok(())
}

/// True when `text` is a non-empty prefix of `of`.
fn is_prefix(text: &str, of: &str) -> bool
{
    !text.is_empty() && of.starts_with(text)
}

fn handle_command(process: &mut Process, line: &str) -> Result<()>
{
    let args: Vec<&str> = line.split_whitespace().collect();
    let command = args[0];

    if is_prefix(command, "continue") {
        process.resume()?;
        let reason = process.wait_on_signal()?;
        println!("process {} {}", process.pid(), reason);
    } else if is_prefix(command, "register") {
        handle_register_command(process, &args)?;
    } else if is_prefix(command, "help") {
        print_help();
    } else {
        eprintln!("Unknown command: {command}");
    }

    Ok(())
}

fn handle_register_command(process: &mut Process, args: &[&str]) -> Result<()>
{
    let Some(subcommand) = args.get(1) else {
        eprintln!("Usage: register (read [name] | write <name> <value>)");
        return Ok(());
    };

    if is_prefix(subcommand, "read") {
        match args.get(2) {
            Some(name) => {
                let info = register_info_by_name(name)?;
                let value = process.registers().read(info)?;
                println!("{}\t{}", info.name, value);
            }
            None => {
                // All GPRs; orig_rax is kernel bookkeeping, not program state.
                for info in register_infos()
                    .iter()
                    .filter(|info| info.ty == RegisterType::Gpr && info.name != "orig_rax")
                {
                    let value = process.registers().read(info)?;
                    println!("{}\t{}", info.name, value);
                }
            }
        }
    } else if is_prefix(subcommand, "write") {
        let (Some(name), Some(text)) = (args.get(2), args.get(3)) else {
            eprintln!("Usage: register write <name> <value>");
            return Ok(());
        };
        let info = register_info_by_name(name)?;
        let value = parse_register_value(info, text)?;
        process.write_register(info, value)?;
    } else {
        eprintln!("Unknown register command: {subcommand}");
    }

    Ok(())
}

/// Parse a command-line value into the width and format the register wants.
fn parse_register_value(info: &'static RegisterInfo, text: &str) -> Result<RegisterValue>
{
    let invalid = || GrapnelError::InvalidArgument(format!("invalid value for {}: {text}", info.name));

    match info.format {
        RegisterFormat::Uint => {
            let value = if let Some(hex) = text.strip_prefix("0x") {
                u64::from_str_radix(hex, 16).map_err(|_| invalid())?
            } else {
                text.parse::<u64>().map_err(|_| invalid())?
            };

            match info.size {
                1 => u8::try_from(value).map(RegisterValue::U8).map_err(|_| invalid()),
                2 => u16::try_from(value).map(RegisterValue::U16).map_err(|_| invalid()),
                4 => u32::try_from(value).map(RegisterValue::U32).map_err(|_| invalid()),
                _ => Ok(RegisterValue::U64(value)),
            }
        }
        RegisterFormat::DoubleFloat => text.parse::<f64>().map(RegisterValue::F64).map_err(|_| invalid()),
        RegisterFormat::LongDouble | RegisterFormat::Vector => Err(GrapnelError::InvalidArgument(
            format!("{} cannot be written from the command line", info.name),
        )),
    }
}

fn print_help()
{
    println!("Available commands:");
    println!("  continue                       resume the inferior and wait for the next stop");
    println!("  register read                  read all general-purpose registers");
    println!("  register read <name>           read one register");
    println!("  register write <name> <value>  write one register and flush it to the inferior");
    println!("  help                           show this help");
    println!("  quit                           detach/kill the inferior and exit");
}
