//! The execution engine: fetch, decode, dispatch, repeat.
//!
//! A [`Machine`] owns the operand stack and the program counter; it borrows
//! the [`OpcodeRegistry`] for the duration of [`execute`](Machine::execute)
//! so any number of machines can share one registry.
//!
//! Control flow convention: `JUMP`/`JZ` operands are instruction indices.
//! Running past the last instruction stops the machine as if it had halted;
//! a jump past the end therefore stops cleanly, while a negative jump target
//! is a fault.

use crate::errors::VMError;
use crate::opcodes::BuiltinOp;
use crate::program::{Instruction, Program};
use crate::registry::{OpcodeKind, OpcodeRegistry};
use crate::stack::Stack;

pub mod costs;


use self::costs::{CostCategory, CostProfile, EXTENSION_COST, category_of};

/// How many stack values a trace line shows, counted from the top.
const TRACE_STACK_DEPTH: usize = 10;

/// A stack machine instance: operand stack, loaded program, program counter.
#[derive(Debug, Default)]
pub struct Machine {
    stack: Stack,
    program: Program,
    pc: usize,
    running: bool,
    trace: bool,
    profile: CostProfile,
    instructions_executed: u64,
}

impl Machine {
    /// Creates a machine with an empty stack and no program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a program and resets the program counter.
    ///
    /// The operand stack is left untouched so chained runs can share state.
    pub fn load(&mut self, program: Program) {
        self.program = program;
        self.pc = 0;
    }

    /// Enables or disables per-instruction trace output.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// The operand stack.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Current program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Accumulated cycle accounting for every instruction executed so far.
    pub fn profile(&self) -> &CostProfile {
        &self.profile
    }

    /// Total instructions executed across all runs.
    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    /// Runs the loaded program to completion.
    ///
    /// Execution stops on `HALT` or when the program counter moves past the
    /// last instruction. A fault leaves the machine state (stack, pc) as it
    /// was at the faulting instruction.
    pub fn execute(&mut self, registry: &OpcodeRegistry) -> Result<(), VMError> {
        self.running = true;
        while self.running && self.pc < self.program.len() {
            // Fetch is infallible inside the loop bound.
            let Some(&instruction) = self.program.get(self.pc) else {
                break;
            };
            if self.trace {
                println!("{}", self.trace_line(&instruction, registry));
            }
            self.step(instruction, registry)?;
            self.pc = self.pc.wrapping_add(1);
        }
        self.running = false;
        Ok(())
    }

    fn step(&mut self, instruction: Instruction, registry: &OpcodeRegistry) -> Result<(), VMError> {
        let descriptor = registry
            .descriptor_by_value(instruction.opcode)
            .ok_or(VMError::UnknownOpcode {
                value: instruction.opcode,
                address: self.pc,
            })?;

        match descriptor.kind() {
            OpcodeKind::Builtin(op) => {
                self.execute_builtin(*op, instruction.operand)?;
                self.profile.add(category_of(*op), op.base_cost());
            }
            OpcodeKind::Extension(_) => {
                registry.execute_extension(descriptor.name(), &mut self.stack, instruction.operand)?;
                self.profile.add(CostCategory::Extension, EXTENSION_COST);
            }
        }
        self.instructions_executed += 1;
        Ok(())
    }

    fn execute_builtin(&mut self, op: BuiltinOp, operand: Option<i32>) -> Result<(), VMError> {
        match op {
            BuiltinOp::Push => {
                self.stack.push(i64::from(operand.unwrap_or(0)));
            }
            BuiltinOp::Pop => {
                self.stack.pop()?;
            }
            BuiltinOp::Add => self.binary_op(i64::wrapping_add)?,
            BuiltinOp::Sub => self.binary_op(i64::wrapping_sub)?,
            BuiltinOp::Mul => self.binary_op(i64::wrapping_mul)?,
            BuiltinOp::Div => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                if b == 0 {
                    return Err(VMError::DivisionByZero);
                }
                self.stack.push(floor_div(a, b));
            }
            BuiltinOp::Dup => {
                let top = self.stack.peek()?;
                self.stack.push(top);
            }
            BuiltinOp::Swap => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(b);
                self.stack.push(a);
            }
            BuiltinOp::Print => {
                println!("Output: {}", self.stack.peek()?);
            }
            BuiltinOp::Jump => {
                self.jump(operand.unwrap_or(0))?;
            }
            BuiltinOp::Jz => {
                let condition = self.stack.pop()?;
                if condition == 0 {
                    self.jump(operand.unwrap_or(0))?;
                }
            }
            BuiltinOp::Halt => {
                println!("Program halted.");
                self.running = false;
            }
        }
        Ok(())
    }

    /// Pops `b` then `a`, pushes `f(a, b)`.
    fn binary_op(&mut self, f: fn(i64, i64) -> i64) -> Result<(), VMError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        self.stack.push(f(a, b));
        Ok(())
    }

    /// Points the pc one before `target` so the post-step increment lands
    /// exactly on it. A target past the end stops the run at the loop bound.
    fn jump(&mut self, target: i32) -> Result<(), VMError> {
        if target < 0 {
            return Err(VMError::AddressOutOfRange { target });
        }
        self.pc = (target as usize).wrapping_sub(1);
        Ok(())
    }

    fn trace_line(&self, instruction: &Instruction, registry: &OpcodeRegistry) -> String {
        let text = match registry.descriptor_by_value(instruction.opcode) {
            Some(descriptor) => match instruction.operand {
                Some(operand) => format!("{} {}", descriptor.name(), operand),
                None => descriptor.name().to_string(),
            },
            None => format!("0x{:02x}", instruction.opcode),
        };
        render_trace(self.pc, &text, &self.stack)
    }
}

/// Floor division, rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }
}

/// Formats one trace line, showing at most the top [`TRACE_STACK_DEPTH`]
/// stack values (bottom first within the window).
fn render_trace(pc: usize, text: &str, stack: &Stack) -> String {
    let items = stack.items();
    let window = &items[items.len().saturating_sub(TRACE_STACK_DEPTH)..];
    format!("PC:{pc:3} {text:<12} Stack: {window:?}")
}
