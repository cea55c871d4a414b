//! Instruction sequences and the `.stkm` binary container.
//!
//! The container layout is fixed:
//!
//! ```text
//! offset 0  4 bytes  magic "STKM"
//! offset 4  1 byte   format version (currently 1)
//! offset 5  4 bytes  instruction count, u32 little-endian
//! offset 9  5 bytes  per instruction: u8 opcode, i32 little-endian operand
//! ```
//!
//! Every instruction record is 5 bytes whether or not the opcode takes an
//! operand; zero-arity opcodes encode an operand field of 0 and decode back
//! to `None`. A container's byte length must be exactly `9 + 5 * count`.

use crate::errors::VMError;
use crate::registry::OpcodeRegistry;

/// Container magic, first four bytes of every `.stkm` file.
pub const MAGIC: &[u8; 4] = b"STKM";
/// Current container format version.
pub const VERSION: u8 = 1;
/// Size of the container header in bytes.
pub const HEADER_SIZE: usize = 9;
/// Size of one encoded instruction record in bytes.
pub const INSTRUCTION_SIZE: usize = 5;

/// One decoded instruction: a numeric opcode and an optional operand.
///
/// Addresses for `JUMP`/`JZ` are instruction indices, not byte offsets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub opcode: u8,
    pub operand: Option<i32>,
}

impl Instruction {
    pub fn new(opcode: u8, operand: Option<i32>) -> Self {
        Self { opcode, operand }
    }
}

/// An ordered instruction sequence, the unit of storage and execution.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Wraps an instruction sequence.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` when the program holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at index `address`, if any.
    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Encodes the program into the `.stkm` container format.
    ///
    /// Fails with [`VMError::UnknownOpcodeNumber`] if any instruction's
    /// opcode value is not present in `registry`.
    pub fn to_bytes(&self, registry: &OpcodeRegistry) -> Result<Vec<u8>, VMError> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + INSTRUCTION_SIZE * self.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for instruction in &self.instructions {
            if registry.descriptor_by_value(instruction.opcode).is_none() {
                return Err(VMError::UnknownOpcodeNumber {
                    value: instruction.opcode,
                });
            }
            bytes.push(instruction.opcode);
            bytes.extend_from_slice(&instruction.operand.unwrap_or(0).to_le_bytes());
        }
        Ok(bytes)
    }

    /// Decodes a `.stkm` container.
    ///
    /// Validates magic, version, declared count against actual size, and
    /// every opcode value against `registry`. Operands of zero-arity opcodes
    /// decode to `None` regardless of the stored field.
    pub fn from_bytes(bytes: &[u8], registry: &OpcodeRegistry) -> Result<Self, VMError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VMError::SizeMismatch {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if &bytes[0..4] != MAGIC {
            return Err(VMError::InvalidFormat);
        }
        if bytes[4] != VERSION {
            return Err(VMError::UnsupportedVersion {
                actual: bytes[4],
                expected: VERSION,
            });
        }
        let count = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let expected = HEADER_SIZE + INSTRUCTION_SIZE * count;
        if bytes.len() != expected {
            return Err(VMError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut instructions = Vec::with_capacity(count);
        for record in bytes[HEADER_SIZE..].chunks_exact(INSTRUCTION_SIZE) {
            let opcode = record[0];
            let descriptor = registry
                .descriptor_by_value(opcode)
                .ok_or(VMError::UnknownOpcodeNumber { value: opcode })?;
            let operand = if descriptor.has_operand() {
                Some(i32::from_le_bytes([record[1], record[2], record[3], record[4]]))
            } else {
                None
            };
            instructions.push(Instruction::new(opcode, operand));
        }
        Ok(Self { instructions })
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::BuiltinOp;

    fn sample() -> Program {
        Program::new(vec![
            Instruction::new(BuiltinOp::Push.value(), Some(5)),
            Instruction::new(BuiltinOp::Push.value(), Some(3)),
            Instruction::new(BuiltinOp::Add.value(), None),
            Instruction::new(BuiltinOp::Print.value(), None),
            Instruction::new(BuiltinOp::Halt.value(), None),
        ])
    }

    #[test]
    fn encode_layout() {
        let registry = OpcodeRegistry::builtin();
        let bytes = sample().to_bytes(&registry).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 5 * INSTRUCTION_SIZE);
        assert_eq!(&bytes[0..4], b"STKM");
        assert_eq!(bytes[4], VERSION);
        assert_eq!(u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]), 5);
        // First record: PUSH 5.
        assert_eq!(bytes[9], 0x01);
        assert_eq!(&bytes[10..14], &5i32.to_le_bytes());
        // Third record: ADD with a zeroed operand field.
        assert_eq!(bytes[19], 0x03);
        assert_eq!(&bytes[20..24], &[0, 0, 0, 0]);
    }

    #[test]
    fn round_trip_is_identity_and_reencode_is_byte_identical() {
        let registry = OpcodeRegistry::builtin();
        let program = sample();
        let bytes = program.to_bytes(&registry).unwrap();
        let decoded = Program::from_bytes(&bytes, &registry).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.to_bytes(&registry).unwrap(), bytes);
    }

    #[test]
    fn negative_operands_round_trip() {
        let registry = OpcodeRegistry::builtin();
        let program = Program::new(vec![
            Instruction::new(BuiltinOp::Push.value(), Some(-42)),
            Instruction::new(BuiltinOp::Push.value(), Some(i32::MIN)),
            Instruction::new(BuiltinOp::Halt.value(), None),
        ]);
        let bytes = program.to_bytes(&registry).unwrap();
        assert_eq!(Program::from_bytes(&bytes, &registry).unwrap(), program);
    }

    #[test]
    fn empty_program_round_trips() {
        let registry = OpcodeRegistry::builtin();
        let program = Program::default();
        let bytes = program.to_bytes(&registry).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert!(Program::from_bytes(&bytes, &registry).unwrap().is_empty());
    }

    #[test]
    fn zero_arity_operand_field_is_ignored_on_decode() {
        let registry = OpcodeRegistry::builtin();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(BuiltinOp::Add.value());
        bytes.extend_from_slice(&99i32.to_le_bytes());
        let program = Program::from_bytes(&bytes, &registry).unwrap();
        assert_eq!(program.get(0).unwrap().operand, None);
    }

    #[test]
    fn rejects_truncated_header() {
        let registry = OpcodeRegistry::builtin();
        let err = Program::from_bytes(b"STKM", &registry).unwrap_err();
        assert!(matches!(err, VMError::SizeMismatch { expected: 9, actual: 4 }));
    }

    #[test]
    fn rejects_bad_magic() {
        let registry = OpcodeRegistry::builtin();
        let mut bytes = sample().to_bytes(&registry).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Program::from_bytes(&bytes, &registry),
            Err(VMError::InvalidFormat)
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let registry = OpcodeRegistry::builtin();
        let mut bytes = sample().to_bytes(&registry).unwrap();
        bytes[4] = 2;
        assert!(matches!(
            Program::from_bytes(&bytes, &registry),
            Err(VMError::UnsupportedVersion { actual: 2, expected: 1 })
        ));
    }

    #[test]
    fn rejects_size_count_mismatch() {
        let registry = OpcodeRegistry::builtin();
        let mut bytes = sample().to_bytes(&registry).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            Program::from_bytes(&bytes, &registry),
            Err(VMError::SizeMismatch { .. })
        ));
        let mut bytes = sample().to_bytes(&registry).unwrap();
        bytes.push(0);
        assert!(matches!(
            Program::from_bytes(&bytes, &registry),
            Err(VMError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_unknown_opcode_value() {
        let registry = OpcodeRegistry::builtin();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0x20);
        bytes.extend_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            Program::from_bytes(&bytes, &registry),
            Err(VMError::UnknownOpcodeNumber { value: 0x20 })
        ));
    }

    #[test]
    fn encode_rejects_unknown_opcode_value() {
        let registry = OpcodeRegistry::builtin();
        let program = Program::new(vec![Instruction::new(0x20, None)]);
        assert!(matches!(
            program.to_bytes(&registry),
            Err(VMError::UnknownOpcodeNumber { value: 0x20 })
        ));
    }

    #[test]
    fn extension_opcodes_round_trip_with_extended_registry() {
        use crate::registry::ExtensionSpec;
        let registry = OpcodeRegistry::with_extensions([ExtensionSpec {
            name: "MOD".to_string(),
            value: 0x10,
            has_operand: false,
            handler: Box::new(|_, _| Ok(())),
        }]);
        let program = Program::new(vec![
            Instruction::new(0x10, None),
            Instruction::new(BuiltinOp::Halt.value(), None),
        ]);
        let bytes = program.to_bytes(&registry).unwrap();
        assert_eq!(Program::from_bytes(&bytes, &registry).unwrap(), program);

        // The same bytes fail to decode without the extension registered.
        let plain = OpcodeRegistry::builtin();
        assert!(matches!(
            Program::from_bytes(&bytes, &plain),
            Err(VMError::UnknownOpcodeNumber { value: 0x10 })
        ));
    }
}
