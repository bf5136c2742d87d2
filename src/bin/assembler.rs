//! Assembly to machine code compiler CLI.
//!
//! Reads an assembly source file and writes the raw byte image.
//!
//! # Usage
//! ```text
//! assembler <input.asm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.bin`)
//! - `-m, --mount <addr>`: Address the image will be loaded at (defaults to `0x10`)
//! - `-l, --listing`: Print a disassembly listing of the output
//! - `-s, --symbols`: Print the resolved symbol table
//!
//! # Examples
//! ```text
//! assembler program.asm
//! assembler program.asm -o output.bin
//! assembler program.asm --mount 0x100 --listing
//! ```

use minicpu::toolchain::assembler::{DEFAULT_MOUNT_ADDRESS, assemble_file};
use minicpu::toolchain::disassembler::listing;
use minicpu::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut mount = DEFAULT_MOUNT_ADDRESS;
    let mut show_listing = false;
    let mut show_symbols = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            k @ ("--mount" | "-m") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                mount = parse_address(&args[i]).unwrap_or_else(|| {
                    error!("Invalid mount address: '{}'", args[i]);
                    process::exit(1);
                });
                i += 1;
            }
            "--listing" | "-l" => {
                show_listing = true;
                i += 1;
            }
            "--symbols" | "-s" => {
                show_symbols = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let output_path = output_path.unwrap_or_else(|| {
        let p = Path::new(input_path);
        let stem = p.file_stem().unwrap_or_default().to_string_lossy();
        let parent = p.parent().unwrap_or(Path::new("."));
        parent
            .join(format!("{}.bin", stem))
            .to_string_lossy()
            .into_owned()
    });

    if let Some(parent) = Path::new(&output_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    // assemble_file already logged the diagnostic.
    let assembly = match assemble_file(input_path, mount) {
        Ok(a) => a,
        Err(_) => process::exit(1),
    };

    if let Err(e) = fs::write(&output_path, assembly.bytes()) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} bytes at {:#06x})",
        input_path,
        output_path,
        assembly.bytes().len(),
        assembly.mount()
    );

    if show_listing {
        print!("{}", listing(assembly.bytes(), assembly.mount()));
    }

    if show_symbols {
        let name_w = assembly
            .symbols()
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0);
        for (name, addr) in assembly.symbols() {
            println!("{:<name_w$}  {:#06x}", name, addr);
        }
    }
}

/// Parses a decimal or `0x`-prefixed 16-bit address.
fn parse_address(text: &str) -> Option<u16> {
    match text.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

const USAGE: &str = "\
Assembler

USAGE:
    {program} <input.asm> [OPTIONS]

ARGS:
    <input.asm>    Assembly source file to compile

OPTIONS:
    -o, --output <file>    Output file path (defaults to <input>.bin)
    -m, --mount <addr>     Load address, decimal or 0x hex (defaults to 0x10)
    -l, --listing          Print a disassembly listing of the output
    -s, --symbols          Print the resolved symbol table
    -h, --help             Print this help message

EXAMPLES:
    # Compile to default output name
    {program} program.asm

    # Compile with explicit output
    {program} program.asm -o output.bin

    # Compile for a different load address and show the result
    {program} program.asm --mount 0x100 --listing --symbols
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
