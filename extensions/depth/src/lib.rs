//! DEPTH extension opcode.
//!
//! Pushes the current stack depth (counted before the push).

use stackm::extension::{HostStack, STATUS_OK};
use std::ffi::c_char;

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_name() -> *const c_char {
    c"DEPTH".as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_value() -> u8 {
    0x18
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
    let depth = stack.depth() as i64;
    stack.push(depth);
    STATUS_OK
}
