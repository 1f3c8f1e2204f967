//! Pre-scope markers produced by the disassembly pass.
//!
//! A block records only where a structural region starts and ends in
//! instruction-index space, plus the data its scope will need: the
//! condition kind for an `if`, the offset table for a `switch`, the
//! exception types for a `catch`. Blocks convert to scopes when the
//! decompilation pass first enters their range, and are discarded
//! afterwards.

use indexmap::IndexMap;

use crate::{op::CompareKind, types::Type};

/// How an `if` block's condition is built from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfConditionKind {
    /// One-operand integer branch (`ifeq` .. `ifle`): compare with zero,
    /// or repackage a preceding `lcmp`/`fcmp*`/`dcmp*`.
    CmpZero(CompareKind),
    /// Two-operand integer branch (`if_icmp*`).
    ICmp(CompareKind),
    /// Two-operand reference branch (`if_acmpeq`/`if_acmpne`).
    ACmp(CompareKind),
    /// `ifnull`/`ifnonnull`.
    Null(CompareKind),
}

/// Block variants.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    If {
        condition: IfConditionKind,
        /// Exclusive end of the attached `else` region, discovered from
        /// the `goto` terminating the conditional body.
        else_end: Option<usize>,
    },
    /// Region of a backward branch: `[target, goto + 1)`.
    Loop,
    Switch {
        default_index: usize,
        /// Case value to handler index, in table order.
        cases: IndexMap<i32, usize>,
        /// A break has pinned the end; later breaks must not move it.
        end_fixed: bool,
    },
    Try,
    Catch {
        /// Union of exception types handled here; more than one entry
        /// renders as a multi-catch.
        types: Vec<Type>,
        /// Another handler of the same `try` follows.
        has_next: bool,
    },
}

/// A structural region `[start, end)` awaiting conversion to a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub start: usize,
    /// Exclusive end index. Mutable for loops extended by later backward
    /// branches, switches pinned by breaks, and the last catch of a chain.
    pub end: usize,
}

impl Block {
    pub fn new(kind: BlockKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }

    /// Conversion rank for blocks sharing a start index: outermost first.
    pub fn rank(&self) -> u8 {
        match self.kind {
            BlockKind::Loop => 0,
            BlockKind::Try => 1,
            BlockKind::Switch { .. } => 2,
            BlockKind::If { .. } => 3,
            BlockKind::Catch { .. } => 4,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}
