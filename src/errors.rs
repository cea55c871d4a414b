use thiserror::Error;

/// Errors that can occur during compilation, decoding, or execution.
#[derive(Debug, Error)]
pub enum VMError {
    // ---- Parse faults (raised by the compiler, line-addressed) ----
    /// Unrecognized opcode mnemonic in source.
    #[error("line {line}: unknown opcode '{name}'")]
    UnknownOpcodeName { line: usize, name: String },
    /// Operand token that is neither an integer nor a resolvable label.
    #[error("line {line}: invalid operand '{token}' - must be an integer")]
    InvalidOperand { line: usize, token: String },
    /// Operand-bearing opcode written without an operand.
    #[error("line {line}: opcode '{name}' requires an operand")]
    MissingOperand { line: usize, name: String },
    /// Zero-arity opcode written with an operand.
    #[error("line {line}: opcode '{name}' takes no operand")]
    UnexpectedOperand { line: usize, name: String },
    /// Label definition with no name before the colon.
    #[error("line {line}: empty label name")]
    EmptyLabel { line: usize },
    /// Label defined more than once.
    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
    /// Jump operand referencing a label that was never defined.
    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    // ---- Format faults (raised by the bytecode container codec) ----
    /// Container does not start with the `STKM` magic bytes.
    #[error("invalid file format: expected STKM magic number")]
    InvalidFormat,
    /// Container version is not the supported one.
    #[error("unsupported version: {actual} (expected {expected})")]
    UnsupportedVersion { actual: u8, expected: u8 },
    /// Container is truncated or carries trailing bytes.
    #[error("container size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    /// Numeric opcode with no registry entry.
    #[error("unknown opcode number: 0x{value:02x}")]
    UnknownOpcodeNumber { value: u8 },

    // ---- Runtime faults (raised by the execution engine) ----
    /// Pop from an empty operand stack.
    #[error("stack underflow: cannot pop from empty stack")]
    StackUnderflow,
    /// Peek at an empty operand stack.
    #[error("stack is empty")]
    StackEmpty,
    /// DIV with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// Instruction whose opcode is absent from the registry.
    #[error("unknown opcode 0x{value:02x} at address {address}")]
    UnknownOpcode { value: u8, address: usize },
    /// Jump to an address that cannot be represented in the program.
    #[error("jump target {target} out of range")]
    AddressOutOfRange { target: i32 },

    // ---- Extension faults ----
    /// Opcode name lookup that matched neither built-ins nor extensions.
    #[error("unknown opcode name: {name}")]
    UnknownName { name: String },
    /// Extension dispatch for a name that was never accepted.
    #[error("unknown extension opcode: {name}")]
    UnknownExtensionOpcode { name: String },
    /// Extension handler reported a failure status the host has no mapping for.
    #[error("extension '{name}' failed with status {status}")]
    ExtensionFault { name: String, status: i32 },

    /// File I/O error while reading source or writing bytecode.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
