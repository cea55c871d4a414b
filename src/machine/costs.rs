//! Simulated cycle accounting for executed instructions.
//!
//! Every built-in opcode charges a fixed cycle cost; extension opcodes are
//! charged a flat [`EXTENSION_COST`]. Costs accumulate per category so the
//! runner can print an execution profile after a run.

use crate::opcodes::BuiltinOp;

/// Flat cycle cost charged for any extension opcode.
pub const EXTENSION_COST: u64 = 1;

/// Cost category an executed instruction is accounted under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum CostCategory {
    StackOp,
    Arithmetic,
    ControlFlow,
    Io,
    Extension,
}

impl CostCategory {
    /// All categories in display order.
    pub const ALL: [CostCategory; 5] = [
        CostCategory::StackOp,
        CostCategory::Arithmetic,
        CostCategory::ControlFlow,
        CostCategory::Io,
        CostCategory::Extension,
    ];

    /// Human-readable category label.
    pub const fn label(self) -> &'static str {
        match self {
            CostCategory::StackOp => "stack",
            CostCategory::Arithmetic => "arithmetic",
            CostCategory::ControlFlow => "control flow",
            CostCategory::Io => "i/o",
            CostCategory::Extension => "extension",
        }
    }
}

/// Maps a built-in opcode to its cost category.
pub const fn category_of(op: BuiltinOp) -> CostCategory {
    match op {
        BuiltinOp::Push | BuiltinOp::Pop | BuiltinOp::Dup | BuiltinOp::Swap => {
            CostCategory::StackOp
        }
        BuiltinOp::Add | BuiltinOp::Sub | BuiltinOp::Mul | BuiltinOp::Div => {
            CostCategory::Arithmetic
        }
        BuiltinOp::Jump | BuiltinOp::Jz | BuiltinOp::Halt => CostCategory::ControlFlow,
        BuiltinOp::Print => CostCategory::Io,
    }
}

/// Accumulated cycles and instruction counts, bucketed by category.
#[derive(Clone, Debug, Default)]
pub struct CostProfile {
    cycles: [u64; 5],
    counts: [u64; 5],
}

impl CostProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges `cycles` under `category` and counts one instruction.
    pub fn add(&mut self, category: CostCategory, cycles: u64) {
        self.cycles[category as usize] += cycles;
        self.counts[category as usize] += 1;
    }

    /// Total cycles charged across all categories.
    pub fn total_cycles(&self) -> u64 {
        self.cycles.iter().sum()
    }

    /// Total instructions accounted across all categories.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Iterates `(category, instruction count, cycles)` in display order.
    pub fn iter(&self) -> impl Iterator<Item = (CostCategory, u64, u64)> + '_ {
        CostCategory::ALL
            .into_iter()
            .map(|c| (c, self.counts[c as usize], self.cycles[c as usize]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_costs_are_fixed() {
        assert_eq!(BuiltinOp::Push.base_cost(), 1);
        assert_eq!(BuiltinOp::Mul.base_cost(), 3);
        assert_eq!(BuiltinOp::Div.base_cost(), 10);
        assert_eq!(BuiltinOp::Jump.base_cost(), 2);
        assert_eq!(BuiltinOp::Jz.base_cost(), 2);
        assert_eq!(BuiltinOp::Print.base_cost(), 5);
        assert_eq!(BuiltinOp::Halt.base_cost(), 1);
    }

    #[test]
    fn categories_cover_all_builtins() {
        for op in BuiltinOp::ALL {
            assert_ne!(category_of(op), CostCategory::Extension);
        }
        assert_eq!(category_of(BuiltinOp::Dup), CostCategory::StackOp);
        assert_eq!(category_of(BuiltinOp::Div), CostCategory::Arithmetic);
        assert_eq!(category_of(BuiltinOp::Halt), CostCategory::ControlFlow);
        assert_eq!(category_of(BuiltinOp::Print), CostCategory::Io);
    }

    #[test]
    fn profile_accumulates_by_category() {
        let mut profile = CostProfile::new();
        profile.add(CostCategory::StackOp, 1);
        profile.add(CostCategory::StackOp, 1);
        profile.add(CostCategory::Arithmetic, 10);
        assert_eq!(profile.total_cycles(), 12);
        assert_eq!(profile.total_count(), 3);
        let by_cat: Vec<_> = profile.iter().collect();
        assert_eq!(by_cat[0], (CostCategory::StackOp, 2, 2));
        assert_eq!(by_cat[1], (CostCategory::Arithmetic, 1, 10));
        assert_eq!(by_cat[4], (CostCategory::Extension, 0, 0));
    }
}
