//! Built-in instruction set definitions.
//!
//! The [`for_each_builtin!`](crate::for_each_builtin) macro holds the canonical
//! built-in opcode definitions and invokes a callback macro for code
//! generation, so multiple modules can generate opcode-related code without
//! duplicating the table.
//!
//! The numeric values are frozen: changing any entry breaks every compiled
//! `.stkm` container in existence. Extensions may claim values in
//! `0x10..=0xFE` only; `0x01..=0x0B` and `0xFF` are reserved here.

/// Invokes a callback macro with the complete built-in opcode list.
///
/// Each entry is `Variant = value, "MNEMONIC", has_operand, cycle_cost`.
#[macro_export]
macro_rules! for_each_builtin {
    ($callback:ident) => {
        $callback! {
            /// PUSH n ; push n onto the stack
            Push = 0x01, "PUSH", true, 1,
            /// POP ; discard the top value
            Pop = 0x02, "POP", false, 1,
            /// ADD ; pop b, pop a, push a + b
            Add = 0x03, "ADD", false, 1,
            /// SUB ; pop b, pop a, push a - b
            Sub = 0x04, "SUB", false, 1,
            /// MUL ; pop b, pop a, push a * b
            Mul = 0x05, "MUL", false, 3,
            /// DIV ; pop b, pop a, push a / b (floor division)
            Div = 0x06, "DIV", false, 10,
            /// DUP ; push a second copy of the top value
            Dup = 0x07, "DUP", false, 1,
            /// SWAP ; exchange the top two values
            Swap = 0x08, "SWAP", false, 1,
            /// PRINT ; emit the top value without popping it
            Print = 0x09, "PRINT", false, 5,
            /// JUMP addr ; continue execution at instruction index addr
            Jump = 0x0A, "JUMP", true, 2,
            /// JZ addr ; pop the top value, jump to addr if it is zero
            Jz = 0x0B, "JZ", true, 2,
            /// HALT ; stop execution
            Halt = 0xFF, "HALT", false, 1,
        }
    };
}

macro_rules! define_builtins {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $value:expr, $mnemonic:literal, $has_operand:expr, $cost:expr
        ),* $(,)?
    ) => {
        /// A built-in opcode with a permanently reserved numeric value.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum BuiltinOp {
            $(
                $(#[$doc])*
                $name = $value,
            )*
        }

        impl BuiltinOp {
            /// All built-in opcodes in table order.
            pub const ALL: [BuiltinOp; 12] = [ $( BuiltinOp::$name, )* ];

            /// Returns the canonical uppercase mnemonic.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( BuiltinOp::$name => $mnemonic, )*
                }
            }

            /// Returns the frozen numeric opcode value.
            pub const fn value(self) -> u8 {
                self as u8
            }

            /// Returns whether this opcode carries an operand.
            pub const fn has_operand(self) -> bool {
                match self {
                    $( BuiltinOp::$name => $has_operand, )*
                }
            }

            /// Returns the simulated cycle cost charged per execution.
            pub const fn base_cost(self) -> u64 {
                match self {
                    $( BuiltinOp::$name => $cost, )*
                }
            }

            /// Looks up a built-in by its numeric value.
            pub fn from_value(value: u8) -> Option<BuiltinOp> {
                match value {
                    $( $value => Some(BuiltinOp::$name), )*
                    _ => None,
                }
            }
        }
    };
}

for_each_builtin!(define_builtins);

/// Lowest numeric value an extension opcode may claim.
pub const EXTENSION_VALUE_MIN: u8 = 0x10;
/// Highest numeric value an extension opcode may claim.
pub const EXTENSION_VALUE_MAX: u8 = 0xFE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values_are_frozen() {
        assert_eq!(BuiltinOp::Push.value(), 0x01);
        assert_eq!(BuiltinOp::Pop.value(), 0x02);
        assert_eq!(BuiltinOp::Add.value(), 0x03);
        assert_eq!(BuiltinOp::Div.value(), 0x06);
        assert_eq!(BuiltinOp::Jz.value(), 0x0B);
        assert_eq!(BuiltinOp::Halt.value(), 0xFF);
    }

    #[test]
    fn operand_arity() {
        assert!(BuiltinOp::Push.has_operand());
        assert!(BuiltinOp::Jump.has_operand());
        assert!(BuiltinOp::Jz.has_operand());
        for op in [
            BuiltinOp::Pop,
            BuiltinOp::Add,
            BuiltinOp::Sub,
            BuiltinOp::Mul,
            BuiltinOp::Div,
            BuiltinOp::Dup,
            BuiltinOp::Swap,
            BuiltinOp::Print,
            BuiltinOp::Halt,
        ] {
            assert!(!op.has_operand(), "{} should take no operand", op.mnemonic());
        }
    }

    #[test]
    fn from_value_roundtrips() {
        for op in BuiltinOp::ALL {
            assert_eq!(BuiltinOp::from_value(op.value()), Some(op));
        }
        assert_eq!(BuiltinOp::from_value(0x00), None);
        assert_eq!(BuiltinOp::from_value(0x10), None);
    }

    #[test]
    fn builtin_values_outside_extension_range() {
        for op in BuiltinOp::ALL {
            let v = op.value();
            assert!(!(EXTENSION_VALUE_MIN..=EXTENSION_VALUE_MAX).contains(&v));
        }
    }
}
