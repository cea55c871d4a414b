//! Stack machine library.
//!
//! A stack-based virtual machine with an extensible instruction set:
//! assembly compiler, `.stkm` bytecode container, execution engine,
//! disassembler, and dynamic opcode discovery via native extension
//! libraries.

pub mod compiler;
pub mod disassembler;
pub mod errors;
pub mod extension;
pub mod machine;
pub mod opcodes;
pub mod program;
pub mod registry;
pub mod stack;
pub mod utils;
