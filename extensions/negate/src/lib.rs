//! NEG extension opcode.
//!
//! Pops the top value and pushes its arithmetic negation (wrapping).

use stackm::extension::{HostStack, STATUS_OK, STATUS_STACK_UNDERFLOW};
use std::ffi::c_char;

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_name() -> *const c_char {
    c"NEG".as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn stackm_opcode_value() -> u8 {
    0x11
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
    let Some(v) = stack.pop() else {
        return STATUS_STACK_UNDERFLOW;
    };
    stack.push(v.wrapping_neg());
    STATUS_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackm::stack::Stack;

    #[test]
    fn negates_in_place() {
        let mut stack = Stack::new();
        stack.push(42);
        let mut host = HostStack::new(&mut stack);
        assert_eq!(unsafe { stackm_execute(&mut host, 0, false) }, STATUS_OK);
        assert_eq!(stack.peek().unwrap(), -42);
        assert_eq!(stack.size(), 1);
    }

    #[test]
    fn min_value_wraps() {
        let mut stack = Stack::new();
        stack.push(i64::MIN);
        let mut host = HostStack::new(&mut stack);
        assert_eq!(unsafe { stackm_execute(&mut host, 0, false) }, STATUS_OK);
        assert_eq!(stack.peek().unwrap(), i64::MIN);
    }

    #[test]
    fn underflow_reports_status() {
        let mut stack = Stack::new();
        let mut host = HostStack::new(&mut stack);
        assert_eq!(
            unsafe { stackm_execute(&mut host, 0, false) },
            STATUS_STACK_UNDERFLOW
        );
    }
}
