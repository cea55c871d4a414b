//! Bytecode-to-assembly disassembler.
//!
//! Output re-compiles to the same container: mnemonics come from the same
//! registry the compiler uses, so extension opcodes disassemble by name as
//! long as their libraries are loaded.

use crate::errors::VMError;
use crate::program::{HEADER_SIZE, INSTRUCTION_SIZE, Program};
use crate::registry::OpcodeRegistry;
use std::fmt::Write;
use std::path::Path;

/// Rendering options.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisasmOptions {
    /// Annotate each instruction with its byte offset in the container.
    pub show_addresses: bool,
    /// Also show each instruction's encoded bytes. Implies addresses.
    pub verbose: bool,
}

/// Renders a program as assembly source.
///
/// `source_name` only labels the output header; it is not read.
pub fn disassemble(
    program: &Program,
    registry: &OpcodeRegistry,
    source_name: &str,
    options: DisasmOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Disassembled from {source_name}");
    let _ = writeln!(out, "# {} instructions", program.len());
    let _ = writeln!(out);

    for (index, instruction) in program.iter().enumerate() {
        let text = match registry.descriptor_by_value(instruction.opcode) {
            Some(descriptor) => match instruction.operand {
                Some(operand) => format!("{} {}", descriptor.name(), operand),
                None => descriptor.name().to_string(),
            },
            // Decoding already validated opcodes; kept for manually built
            // programs.
            None => format!("0x{:02x}", instruction.opcode),
        };

        if options.show_addresses || options.verbose {
            let offset = HEADER_SIZE + index * INSTRUCTION_SIZE;
            let _ = write!(out, "{text:<20} # @0x{offset:04x}");
            if options.verbose {
                let operand_bytes = instruction.operand.unwrap_or(0).to_le_bytes();
                let _ = write!(out, ": {:02x}", instruction.opcode);
                for byte in operand_bytes {
                    let _ = write!(out, " {byte:02x}");
                }
            }
            let _ = writeln!(out);
        } else {
            let _ = writeln!(out, "{text}");
        }
    }
    out
}

/// Reads and disassembles a `.stkm` container.
///
/// Returns the rendered assembly and the instruction count.
pub fn disassemble_path(
    path: &Path,
    registry: &OpcodeRegistry,
    options: DisasmOptions,
) -> Result<(String, usize), VMError> {
    let bytes = std::fs::read(path)?;
    let program = Program::from_bytes(&bytes, registry)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let count = program.len();
    Ok((disassemble(&program, registry, &name, options), count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse_source;
    use crate::registry::ExtensionSpec;

    fn sample(registry: &OpcodeRegistry) -> Program {
        parse_source("PUSH 5\nPUSH 3\nADD\nPRINT\nHALT", registry).unwrap()
    }

    #[test]
    fn plain_listing() {
        let registry = OpcodeRegistry::builtin();
        let text = disassemble(
            &sample(&registry),
            &registry,
            "prog.stkm",
            DisasmOptions::default(),
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Disassembled from prog.stkm");
        assert_eq!(lines[1], "# 5 instructions");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "PUSH 5");
        assert_eq!(lines[5], "ADD");
        assert_eq!(lines[7], "HALT");
    }

    #[test]
    fn listing_recompiles_to_same_program() {
        let registry = OpcodeRegistry::builtin();
        let program = sample(&registry);
        let text = disassemble(&program, &registry, "prog.stkm", DisasmOptions::default());
        assert_eq!(parse_source(&text, &registry).unwrap(), program);
    }

    #[test]
    fn addresses_annotate_byte_offsets() {
        let registry = OpcodeRegistry::builtin();
        let text = disassemble(
            &sample(&registry),
            &registry,
            "prog.stkm",
            DisasmOptions {
                show_addresses: true,
                verbose: false,
            },
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], format!("{:<20} # @0x0009", "PUSH 5"));
        assert_eq!(lines[4], format!("{:<20} # @0x000e", "PUSH 3"));
        assert_eq!(lines[7], format!("{:<20} # @0x001d", "HALT"));
    }

    #[test]
    fn verbose_shows_encoded_bytes() {
        let registry = OpcodeRegistry::builtin();
        let text = disassemble(
            &sample(&registry),
            &registry,
            "prog.stkm",
            DisasmOptions {
                show_addresses: false,
                verbose: true,
            },
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[3],
            format!("{:<20} # @0x0009: 01 05 00 00 00", "PUSH 5")
        );
        assert_eq!(
            lines[5],
            format!("{:<20} # @0x0013: 03 00 00 00 00", "ADD")
        );
    }

    #[test]
    fn extension_opcodes_disassemble_by_name() {
        let registry = OpcodeRegistry::with_extensions([ExtensionSpec {
            name: "MOD".to_string(),
            value: 0x10,
            has_operand: false,
            handler: Box::new(|_, _| Ok(())),
        }]);
        let program = parse_source("PUSH 10\nPUSH 3\nMOD\nHALT", &registry).unwrap();
        let text = disassemble(&program, &registry, "m.stkm", DisasmOptions::default());
        assert!(text.lines().any(|l| l == "MOD"));
    }

    #[test]
    fn disassemble_path_round_trips_through_disk() {
        let registry = OpcodeRegistry::builtin();
        let dir = std::env::temp_dir().join(format!("stackm-disasm-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let bin = dir.join("prog.stkm");
        let program = sample(&registry);
        std::fs::write(&bin, program.to_bytes(&registry).unwrap()).unwrap();

        let (text, count) = disassemble_path(&bin, &registry, DisasmOptions::default()).unwrap();
        assert_eq!(count, 5);
        assert!(text.starts_with("# Disassembled from prog.stkm"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
