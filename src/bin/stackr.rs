//! Bytecode runner CLI.
//!
//! Loads a `.stkm` container and executes it on a fresh machine.
//!
//! # Usage
//! ```text
//! stackr <program.stkm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program.stkm`: Compiled bytecode file to execute
//!
//! # Options
//! - `-t, --trace`: Print each instruction and the stack before executing it
//! - `-s, --stats`: Print an execution profile after the run
//! - `-e, --extensions <dir>`: Extension library directory (defaults to `./extensions`)
//!
//! # Examples
//! ```text
//! stackr program.stkm
//! stackr program.stkm --trace
//! stackr program.stkm --stats -e ./my-opcodes
//! ```

use stackm::machine::Machine;
use stackm::machine::costs::CostProfile;
use stackm::program::Program;
use stackm::registry::OpcodeRegistry;
use stackm::{error, info};
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
    let mut trace = false;
    let mut stats = false;
    let mut extensions_dir = String::from("./extensions");

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--trace" | "-t" => {
                trace = true;
                i += 1;
            }
            "--stats" | "-s" => {
                stats = true;
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

    let bytes = match fs::read(input_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let registry = OpcodeRegistry::discover(Path::new(&extensions_dir));

    let program = match Program::from_bytes(&bytes, &registry) {
        Ok(program) => program,
        Err(e) => {
            error!("Failed to load {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let mut machine = Machine::new();
    machine.set_trace(trace);
    machine.load(program);

    if let Err(e) = machine.execute(&registry) {
        error!("Execution failed at pc {}: {}", machine.pc(), e);
        process::exit(1);
    }

    if stats {
        print_profile(machine.profile());
        info!("Executed {} instructions", machine.instructions_executed());
    }
}

fn print_profile(profile: &CostProfile) {
    let total_u = profile.total_cycles();
    let total = total_u as f64;

    let cat_w = 2 + profile
        .iter()
        .map(|(c, _, _)| c.label().chars().count())
        .max()
        .unwrap_or(0)
        .max("total".chars().count());

    let amt_w = profile
        .iter()
        .map(|(_, _, cycles)| format_with_commas(cycles).chars().count())
        .max()
        .unwrap_or(0)
        .max(format_with_commas(total_u).chars().count());

    let dash_w = cat_w + 1 + amt_w + 2 + "( 100.0%)".len();

    println!("Execution Profile:");
    println!("{}", "-".repeat(dash_w));

    for (category, _, cycles) in profile.iter() {
        if cycles == 0 {
            continue;
        }

        let percent = if total > 0.0 {
            (cycles as f64 / total) * 100.0
        } else {
            0.0
        };

        let line = format!(
            "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.label(),
            format_with_commas(cycles),
            percent,
            cat_w = cat_w,
            amt_w = amt_w,
        );
        println!("{line}");
    }

    println!("{}", "-".repeat(dash_w));

    let total_line = format!(
        "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
        "total",
        format_with_commas(total_u),
        100.0,
        cat_w = cat_w,
        amt_w = amt_w,
    );
    println!("{total_line}");
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const USAGE: &str = "\
Stack Machine Runner

USAGE:
    {program} <program.stkm> [OPTIONS]

ARGS:
    <program.stkm>    Compiled bytecode file to execute

OPTIONS:
    -t, --trace              Print each instruction and the stack before executing it
    -s, --stats              Print an execution profile after the run
    -e, --extensions <dir>   Extension library directory (defaults to ./extensions)
    -h, --help               Print this help message

EXAMPLES:
    # Run a program
    {program} program.stkm

    # Run with per-instruction tracing
    {program} program.stkm --trace

    # Run and print cycle statistics
    {program} program.stkm --stats
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
