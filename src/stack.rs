//! The operand stack backing every instruction.

use crate::errors::VMError;

/// A LIFO stack of signed integers.
///
/// LIFO ordering is the only ordering guarantee. Depth is bounded only by
/// available memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack {
    items: Vec<i64>,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a value onto the stack. Never fails.
    pub fn push(&mut self, value: i64) {
        self.items.push(value);
    }

    /// Removes and returns the top value.
    ///
    /// Returns [`VMError::StackUnderflow`] when the stack is empty.
    pub fn pop(&mut self) -> Result<i64, VMError> {
        self.items.pop().ok_or(VMError::StackUnderflow)
    }

    /// Returns the top value without removing it.
    ///
    /// Returns [`VMError::StackEmpty`] when the stack is empty.
    pub fn peek(&self) -> Result<i64, VMError> {
        self.items.last().copied().ok_or(VMError::StackEmpty)
    }

    /// Returns the number of values on the stack.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the stack holds no values.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the stacked values, bottom first.
    pub fn items(&self) -> &[i64] {
        &self.items
    }
}
