//! minicpu runner.
//!
//! Assembles a program, loads it at the mount address and drives the CPU
//! against the 16x16 screen device for a number of host ticks.
//!
//! # Usage
//! ```text
//! minicpu <program.asm> [OPTIONS]
//! ```
//!
//! # Options
//! - `--mount <addr>`: Load address (defaults to `0x10`)
//! - `--cycles <n>`: Cycle budget per tick (defaults to unbounded)
//! - `--ticks <n>`: Number of host ticks (defaults to 1)
//! - `--press <dir>`: Hold a direction button; repeatable
//! - `--trace`: Log every instruction before it executes
//! - `--profile`: Print executed instructions per category

use minicpu::toolchain::assembler::{DEFAULT_MOUNT_ADDRESS, assemble_file};
use minicpu::toolchain::cpu::{Cpu, CycleProfile, ENTRY_POINT_ADDR, Exit};
use minicpu::toolchain::disassembler::decode;
use minicpu::toolchain::io::{Button, Screen};
use minicpu::toolchain::isa::Register;
use minicpu::{Error, error, info};
use std::env;
use std::process;

struct Options {
    input: String,
    mount: u16,
    cycles: Option<u64>,
    ticks: u64,
    pressed: Vec<Button>,
    trace: bool,
    profile: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let options = parse_args(&args);
    if let Err(e) = run(&options) {
        // Assembly failures were already reported as a diagnostic.
        if !matches!(e, Error::Asm(_)) {
            error!("{e}");
        }
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        input: args[1].clone(),
        mount: DEFAULT_MOUNT_ADDRESS,
        cycles: None,
        ticks: 1,
        pressed: Vec::new(),
        trace: false,
        profile: false,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--mount" | "--cycles" | "--ticks" | "--press") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                let value = args[i].as_str();
                match k {
                    "--mount" => {
                        options.mount = parse_number(value)
                            .and_then(|n| u16::try_from(n).ok())
                            .unwrap_or_else(|| {
                                error!("Invalid mount address: '{value}'");
                                process::exit(1);
                            })
                    }
                    "--cycles" => {
                        options.cycles = Some(parse_number(value).unwrap_or_else(|| {
                            error!("Invalid cycle budget: '{value}'");
                            process::exit(1);
                        }))
                    }
                    "--ticks" => {
                        options.ticks = parse_number(value).unwrap_or_else(|| {
                            error!("Invalid tick count: '{value}'");
                            process::exit(1);
                        })
                    }
                    _ => options.pressed.push(Button::parse(value).unwrap_or_else(|| {
                        error!("Unknown button: '{value}' (expected left, right, up or down)");
                        process::exit(1);
                    })),
                }
                i += 1;
            }
            "--trace" => {
                options.trace = true;
                i += 1;
            }
            "--profile" => {
                options.profile = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }
    options
}

/// Parses a decimal or `0x`-prefixed number.
fn parse_number(text: &str) -> Option<u64> {
    match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn run(options: &Options) -> Result<(), Error> {
    let assembly = assemble_file(&options.input, options.mount)?;
    info!(
        "Loaded {} ({} bytes at {:#06x})",
        options.input,
        assembly.bytes().len(),
        assembly.mount()
    );

    let mut cpu = Cpu::new();
    cpu.load_program(assembly.mount(), assembly.bytes())?;

    let mut screen = Screen::new();
    for button in &options.pressed {
        screen.set_button(*button, true);
    }

    for tick in 0..options.ticks {
        let exit = if options.trace {
            trace(&mut cpu, &mut screen, options.cycles)?
        } else {
            cpu.run(&mut screen, options.cycles)?
        };
        if screen.take_dirty() {
            info!("tick {tick}: screen updated");
        }
        if exit == Exit::Paused {
            info!("tick {tick}: paused after {} cycles", cpu.cycles());
        }
    }

    print_state(&cpu, &screen);
    if options.profile {
        print_profile(cpu.profile());
    }
    Ok(())
}

/// Same as [`Cpu::run`], logging each instruction before it executes.
fn trace(cpu: &mut Cpu, screen: &mut Screen, budget: Option<u64>) -> Result<Exit, Error> {
    let mut executed = 0u64;
    loop {
        if budget.is_some_and(|limit| executed >= limit) {
            return Ok(Exit::Paused);
        }
        // A stopped CPU restarts from the entry point, so show that address.
        let ip = if cpu.is_stopped() {
            u16::from_le_bytes([cpu.peek(ENTRY_POINT_ADDR), cpu.peek(ENTRY_POINT_ADDR + 1)])
        } else {
            cpu.ip()
        };
        let (text, _) = decode(cpu.memory(), ip as usize);
        info!("{ip:04x}: {text}");
        executed += 1;
        if cpu.step(screen)? == Exit::Halted {
            return Ok(Exit::Halted);
        }
    }
}

fn print_state(cpu: &Cpu, screen: &Screen) {
    let registers: Vec<_> = Register::ALL
        .iter()
        .map(|r| format!("{}={:#04x}", r.name(), cpu.register(*r)))
        .collect();
    println!("{}", registers.join(" "));
    let flags = cpu.flags();
    println!(
        "ip={:#06x} sp={:#06x} zero={} carry={} cycles={}",
        cpu.ip(),
        cpu.sp(),
        flags.zero as u8,
        flags.carry as u8,
        cpu.cycles()
    );
    print!("{}", screen.render());
}

fn print_profile(profile: &CycleProfile) {
    let total = profile.total();
    let cat_w = 2 + profile
        .iter()
        .map(|(c, _)| c.as_str().len())
        .max()
        .unwrap_or(0)
        .max("total".len());
    let amt_w = total.to_string().len();
    let dash_w = cat_w + 1 + amt_w + 2 + "( 100.0%)".len();

    println!("Cycle Profile:");
    println!("{}", "-".repeat(dash_w));
    for (category, amount) in profile.iter() {
        if amount == 0 {
            continue;
        }
        let percent = if total > 0 {
            (amount as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.as_str(),
            amount,
            percent
        );
    }
    println!("{}", "-".repeat(dash_w));
    println!("{:<cat_w$} {:>amt_w$} ({:>5.1}%)", "total", total, 100.0);
}

const USAGE: &str = "\
minicpu

USAGE:
    {program} <program.asm> [OPTIONS]

ARGS:
    <program.asm>    Assembly source to run

OPTIONS:
    --mount <addr>    Load address, decimal or 0x hex (defaults to 0x10)
    --cycles <n>      Cycle budget per tick (defaults to unbounded)
    --ticks <n>       Number of host ticks to run (defaults to 1)
    --press <dir>     Hold a button: left, right, up or down (repeatable)
    --trace           Log every instruction before it executes
    --profile         Print executed instructions per category
    -h, --help        Print this help message

ENVIRONMENT:
    MINICPU_LOG       Log threshold: debug, info, warn or error

EXAMPLES:
    # Draw one frame of the treasure game
    {program} demos/treasure.asm

    # Walk the player right for five frames
    {program} demos/treasure.asm --ticks 5 --press right
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
