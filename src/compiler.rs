//! Assembly-to-bytecode compiler.
//!
//! Source format: one instruction per line, `#` starts a comment, blank
//! lines are ignored, mnemonics are case-insensitive. A token ending in `:`
//! defines a label at the next instruction's address; `JUMP`/`JZ` operands
//! may name a label instead of a numeric address.
//!
//! Compilation is two passes: the first collects label addresses, the second
//! resolves operands and checks arity against the registry. Arity is
//! enforced at compile time so every encoded instruction round-trips through
//! the container format unchanged.

use crate::errors::VMError;
use crate::program::{Instruction, Program};
use crate::registry::OpcodeRegistry;
use std::collections::BTreeMap;
use std::path::Path;

struct SourceLine<'a> {
    number: usize,
    mnemonic: &'a str,
    operand: Option<&'a str>,
}

/// Parses assembly source into a program, resolving labels and enforcing
/// operand arity against `registry`.
pub fn parse_source(source: &str, registry: &OpcodeRegistry) -> Result<Program, VMError> {
    let mut labels: BTreeMap<&str, usize> = BTreeMap::new();
    let mut lines: Vec<SourceLine<'_>> = Vec::new();

    // Pass 1: strip comments, record label addresses, collect instructions.
    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let mut first = tokens.next().unwrap_or("");

        if let Some(label) = first.strip_suffix(':') {
            if label.is_empty() {
                return Err(VMError::EmptyLabel { line: number });
            }
            if labels.insert(label, lines.len()).is_some() {
                return Err(VMError::DuplicateLabel {
                    line: number,
                    label: label.to_string(),
                });
            }
            // A label may share its line with an instruction.
            match tokens.next() {
                Some(token) => first = token,
                None => continue,
            }
        }

        let operand = tokens.next();
        if let Some(extra) = tokens.next() {
            return Err(VMError::InvalidOperand {
                line: number,
                token: extra.to_string(),
            });
        }
        lines.push(SourceLine {
            number,
            mnemonic: first,
            operand,
        });
    }

    // Pass 2: resolve operands.
    let mut instructions = Vec::with_capacity(lines.len());
    for line in &lines {
        let mnemonic = line.mnemonic.to_ascii_uppercase();
        let descriptor =
            registry
                .descriptor(&mnemonic)
                .ok_or_else(|| VMError::UnknownOpcodeName {
                    line: line.number,
                    name: line.mnemonic.to_string(),
                })?;

        let operand = match (descriptor.has_operand(), line.operand) {
            (true, Some(token)) => Some(resolve_operand(
                token,
                &mnemonic,
                line.number,
                &labels,
            )?),
            (true, None) => {
                return Err(VMError::MissingOperand {
                    line: line.number,
                    name: mnemonic,
                });
            }
            (false, Some(_)) => {
                return Err(VMError::UnexpectedOperand {
                    line: line.number,
                    name: mnemonic,
                });
            }
            (false, None) => None,
        };
        instructions.push(Instruction::new(descriptor.value(), operand));
    }
    Ok(Program::new(instructions))
}

/// Resolves one operand token: a decimal integer, or for `JUMP`/`JZ` a
/// label defined anywhere in the source.
fn resolve_operand(
    token: &str,
    mnemonic: &str,
    line: usize,
    labels: &BTreeMap<&str, usize>,
) -> Result<i32, VMError> {
    if looks_numeric(token) {
        return token.parse::<i32>().map_err(|_| VMError::InvalidOperand {
            line,
            token: token.to_string(),
        });
    }
    if matches!(mnemonic, "JUMP" | "JZ") {
        return match labels.get(token) {
            Some(&address) => Ok(address as i32),
            None => Err(VMError::UndefinedLabel {
                line,
                label: token.to_string(),
            }),
        };
    }
    Err(VMError::InvalidOperand {
        line,
        token: token.to_string(),
    })
}

fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Compiles `input` assembly into a `.stkm` container at `output`.
///
/// Returns the number of instructions written.
pub fn compile_file(
    input: &Path,
    output: &Path,
    registry: &OpcodeRegistry,
) -> Result<usize, VMError> {
    let source = std::fs::read_to_string(input)?;
    let program = parse_source(&source, registry)?;
    std::fs::write(output, program.to_bytes(registry)?)?;
    Ok(program.len())
}
