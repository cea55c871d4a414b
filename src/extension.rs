//! C ABI shared between the host and extension opcode libraries.
//!
//! An extension is a dynamic library exporting four symbols:
//!
//! - [`SYM_OPCODE_NAME`]: `extern "C" fn() -> *const c_char` — the opcode
//!   mnemonic as a NUL-terminated string
//! - [`SYM_OPCODE_VALUE`]: `extern "C" fn() -> u8` — the claimed numeric
//!   value, which must lie in the extension range `0x10..=0xFE`
//! - [`SYM_HAS_OPERAND`]: `extern "C" fn() -> bool` — operand arity
//! - [`SYM_EXECUTE`]: `extern "C" fn(*mut HostStack, i32, bool) -> i32` —
//!   the handler, receiving the operand value and whether one was present,
//!   returning one of the `STATUS_*` codes
//!
//! The handler never sees the machine directly: it receives a [`HostStack`]
//! vtable built around the operand stack for the duration of one call.
//!
//! # Example extension
//!
//! ```ignore
//! use stackm::extension::{HostStack, STATUS_OK, STATUS_STACK_UNDERFLOW};
//! use std::ffi::{CStr, c_char};
//!
//! #[unsafe(no_mangle)]
//! pub extern "C" fn stackm_opcode_name() -> *const c_char {
//!     c"NEG".as_ptr()
//! }
//!
//! #[unsafe(no_mangle)]
//! pub extern "C" fn stackm_opcode_value() -> u8 {
//!     0x11
//! }
//!
//! #[unsafe(no_mangle)]
//! pub extern "C" fn stackm_has_operand() -> bool {
//!     false
//! }
//!
//! #[unsafe(no_mangle)]
//! pub unsafe extern "C" fn stackm_execute(
//!     stack: *mut HostStack,
//!     _operand: i32,
//!     _has_operand: bool,
//! ) -> i32 {
//!     let stack = unsafe { &mut *stack };
//!     let Some(v) = stack.pop() else {
//!         return STATUS_STACK_UNDERFLOW;
//!     };
//!     stack.push(v.wrapping_neg());
//!     STATUS_OK
//! }
//! ```

use crate::errors::VMError;
use crate::stack::Stack;
use std::ffi::c_void;

/// Export name for the opcode-name binding.
pub const SYM_OPCODE_NAME: &[u8] = b"stackm_opcode_name";
/// Export name for the opcode-value binding.
pub const SYM_OPCODE_VALUE: &[u8] = b"stackm_opcode_value";
/// Export name for the operand-arity binding.
pub const SYM_HAS_OPERAND: &[u8] = b"stackm_has_operand";
/// Export name for the execution entry point.
pub const SYM_EXECUTE: &[u8] = b"stackm_execute";

/// Handler completed successfully.
pub const STATUS_OK: i32 = 0;
/// Handler popped from an empty stack.
pub const STATUS_STACK_UNDERFLOW: i32 = 1;
/// Handler divided (or took a modulus) by zero.
pub const STATUS_DIVISION_BY_ZERO: i32 = 2;
/// Handler failed for an extension-specific reason.
pub const STATUS_FAULT: i32 = 3;

/// Signature of the exported name binding.
pub type RawNameFn = unsafe extern "C" fn() -> *const std::ffi::c_char;
/// Signature of the exported value binding.
pub type RawValueFn = unsafe extern "C" fn() -> u8;
/// Signature of the exported arity binding.
pub type RawHasOperandFn = unsafe extern "C" fn() -> bool;
/// Signature of the exported execution entry point.
pub type RawExecuteFn = unsafe extern "C" fn(*mut HostStack, i32, bool) -> i32;

/// Operand-stack vtable handed to extension handlers.
///
/// Valid only for the duration of the `stackm_execute` call it was passed to;
/// handlers must not retain the pointer.
#[repr(C)]
pub struct HostStack {
    ctx: *mut c_void,
    push: unsafe extern "C" fn(*mut c_void, i64),
    pop: unsafe extern "C" fn(*mut c_void, *mut i64) -> i32,
    peek: unsafe extern "C" fn(*mut c_void, *mut i64) -> i32,
    depth: unsafe extern "C" fn(*mut c_void) -> u64,
}

unsafe extern "C" fn push_thunk(ctx: *mut c_void, value: i64) {
    let stack = unsafe { &mut *ctx.cast::<Stack>() };
    stack.push(value);
}

unsafe extern "C" fn pop_thunk(ctx: *mut c_void, out: *mut i64) -> i32 {
    let stack = unsafe { &mut *ctx.cast::<Stack>() };
    match stack.pop() {
        Ok(v) => {
            unsafe { *out = v };
            STATUS_OK
        }
        Err(_) => STATUS_STACK_UNDERFLOW,
    }
}

unsafe extern "C" fn peek_thunk(ctx: *mut c_void, out: *mut i64) -> i32 {
    let stack = unsafe { &*ctx.cast::<Stack>() };
    match stack.peek() {
        Ok(v) => {
            unsafe { *out = v };
            STATUS_OK
        }
        Err(_) => STATUS_STACK_UNDERFLOW,
    }
}

unsafe extern "C" fn depth_thunk(ctx: *mut c_void) -> u64 {
    let stack = unsafe { &*ctx.cast::<Stack>() };
    stack.size() as u64
}

impl HostStack {
    /// Builds a vtable over `stack` for one handler call.
    pub fn new(stack: &mut Stack) -> HostStack {
        HostStack {
            ctx: std::ptr::from_mut(stack).cast(),
            push: push_thunk,
            pop: pop_thunk,
            peek: peek_thunk,
            depth: depth_thunk,
        }
    }

    /// Pushes a value onto the machine's operand stack.
    pub fn push(&mut self, value: i64) {
        unsafe { (self.push)(self.ctx, value) }
    }

    /// Pops the top value, or `None` on underflow.
    pub fn pop(&mut self) -> Option<i64> {
        let mut out = 0i64;
        match unsafe { (self.pop)(self.ctx, &mut out) } {
            STATUS_OK => Some(out),
            _ => None,
        }
    }

    /// Reads the top value without popping, or `None` if the stack is empty.
    pub fn peek(&mut self) -> Option<i64> {
        let mut out = 0i64;
        match unsafe { (self.peek)(self.ctx, &mut out) } {
            STATUS_OK => Some(out),
            _ => None,
        }
    }

    /// Returns the current stack depth.
    pub fn depth(&self) -> usize {
        unsafe { (self.depth)(self.ctx) as usize }
    }
}

/// Invokes a raw extension entry point and maps its status code to a fault.
pub(crate) fn invoke(
    execute: RawExecuteFn,
    name: &str,
    stack: &mut Stack,
    operand: Option<i32>,
) -> Result<(), VMError> {
    let mut host = HostStack::new(stack);
    let status = unsafe { execute(&mut host, operand.unwrap_or(0), operand.is_some()) };
    match status {
        STATUS_OK => Ok(()),
        STATUS_STACK_UNDERFLOW => Err(VMError::StackUnderflow),
        STATUS_DIVISION_BY_ZERO => Err(VMError::DivisionByZero),
        status => Err(VMError::ExtensionFault {
            name: name.to_string(),
            status,
        }),
    }
}
