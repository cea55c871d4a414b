//! Bytecode disassembler CLI.
//!
//! Prints a `.stkm` container as assembly source. The output re-compiles to
//! the same container when the same extensions are loaded.
//!
//! # Usage
//! ```text
//! stackp <program.stkm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program.stkm`: Compiled bytecode file to disassemble
//!
//! # Options
//! - `-o, --output <file>`: Write the listing to a file instead of stdout
//! - `-a, --addresses`: Annotate each instruction with its byte offset
//! - `-v, --verbose`: Also show each instruction's encoded bytes
//! - `-e, --extensions <dir>`: Extension library directory (defaults to `./extensions`)
//!
//! # Examples
//! ```text
//! stackp program.stkm
//! stackp program.stkm -a
//! stackp program.stkm -v > program.asm
//! ```

use stackm::disassembler::{DisasmOptions, disassemble_path};
use stackm::registry::OpcodeRegistry;
use stackm::{error, info};
use std::env;
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
    let mut options = DisasmOptions::default();
    let mut extensions_dir = String::from("./extensions");

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
            "--addresses" | "-a" => {
                options.show_addresses = true;
                i += 1;
            }
            "--verbose" | "-v" => {
                options.verbose = true;
                i += 1;
            }
            k @ ("--extensions" | "-e") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                extensions_dir = args[i].clone();
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let registry = OpcodeRegistry::discover(Path::new(&extensions_dir));

    let (listing, count) = match disassemble_path(Path::new(input_path), &registry, options) {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to disassemble {}: {}", input_path, e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &listing) {
                error!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
            info!(
                "Disassembled {} -> {} ({} instructions)",
                input_path, path, count
            );
        }
        None => print!("{listing}"),
    }
}

const USAGE: &str = "\
Stack Machine Disassembler

USAGE:
    {program} <program.stkm> [OPTIONS]

ARGS:
    <program.stkm>    Compiled bytecode file to disassemble

OPTIONS:
    -o, --output <file>      Write the listing to a file instead of stdout
    -a, --addresses          Annotate each instruction with its byte offset
    -v, --verbose            Also show each instruction's encoded bytes
    -e, --extensions <dir>   Extension library directory (defaults to ./extensions)
    -h, --help               Print this help message

EXAMPLES:
    # Print assembly to stdout
    {program} program.stkm

    # Annotate byte offsets
    {program} program.stkm -a

    # Write recompilable source to a file
    {program} program.stkm > program.asm
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
