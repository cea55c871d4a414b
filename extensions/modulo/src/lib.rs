//! MOD extension opcode.
//!
//! Pops `b` then `a` and pushes `a mod b`, with the result taking the sign
//! of the divisor so that `MOD` agrees with the engine's floor division:
//! `a == (a DIV b) * b + (a MOD b)`.

use stackm::extension::{HostStack, STATUS_DIVISION_BY_ZERO, STATUS_OK, STATUS_STACK_UNDERFLOW};
use std::ffi::c_char;

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_name() -> *const c_char {
    c"MOD".as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_value() -> u8 {
    0x10
}

#[unsafe(no_mangle)]
pub extern "C" fn stackm_has_operand() -> bool {
    false
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn stackm_execute(
    stack: *mut HostStack,
    _operand: i32,
    _has_operand: bool,
) -> i32 {
    let stack = unsafe { &mut *stack };
    let Some(b) = stack.pop() else {
        return STATUS_STACK_UNDERFLOW;
    };
    let Some(a) = stack.pop() else {
        return STATUS_STACK_UNDERFLOW;
    };
    if b == 0 {
        return STATUS_DIVISION_BY_ZERO;
    }
    stack.push(floor_mod(a, b));
    STATUS_OK
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
}
