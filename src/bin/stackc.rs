//! Assembly to bytecode compiler CLI.
//!
//! Reads assembly source files and compiles them to `.stkm` bytecode.
//!
//! # Usage
//! ```text
//! stackc <input.asm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.stkm`)
//! - `-e, --extensions <dir>`: Extension library directory (defaults to `./extensions`)
//!
//! # Examples
//! ```text
//! stackc program.asm
//! stackc program.asm -o build/program.stkm
//! stackc program.asm -e ./my-opcodes
//! ```

use stackm::compiler::compile_file;
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

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let output_path = output_path.unwrap_or_else(|| {
        let p = Path::new(input_path);
        let stem = p.file_stem().unwrap_or_default().to_string_lossy();
        let parent = p.parent().unwrap_or(Path::new("."));
        parent
            .join(format!("{}.stkm", stem))
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

    let registry = OpcodeRegistry::discover(Path::new(&extensions_dir));

    match compile_file(Path::new(input_path), Path::new(&output_path), &registry) {
        Ok(count) => {
            info!(
                "Compiled {} -> {} ({} instructions)",
                input_path, output_path, count
            );
        }
        Err(e) => {
            error!("Compilation failed: {}", e);
            process::exit(1);
        }
    }
}

const USAGE: &str = "\
Stack Machine Compiler

USAGE:
    {program} <input.asm> [OPTIONS]

ARGS:
    <input.asm>    Assembly source file to compile

OPTIONS:
    -o, --output <file>      Output file path (defaults to <input>.stkm)
    -e, --extensions <dir>   Extension library directory (defaults to ./extensions)
    -h, --help               Print this help message

EXAMPLES:
    # Compile to default output name
    {program} program.asm

    # Compile with explicit output
    {program} program.asm -o build/program.stkm
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
