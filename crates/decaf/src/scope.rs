//! Lexical scopes reconstructed from control flow.
//!
//! A scope is a region `[start, end)` in instruction-index space with a
//! parent link and an ordered body of statements and nested scopes. Cross
//! references (an `if` and its `else`, a `break` and its loop) are ids
//! into the arena rather than pointers, so rewrites at finalize time
//! never fight the borrow checker over back edges.

use indexmap::IndexMap;

use crate::{op::OpId, types::Type, var::VarId};

/// Index of a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

/// A statement or a nested scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Op(OpId),
    Scope(ScopeId),
}

/// Body entry plus the instruction index its expression started at; the
/// switch printer uses the index to place `case` labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeItem {
    pub item: Item,
    pub at: usize,
}

/// Scope variants and their per-variant state.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeKind {
    /// The method body itself.
    Method,
    /// A plain braced block.
    Block,
    If {
        condition: OpId,
        else_scope: Option<ScopeId>,
        /// First index of the body; everything before it builds the
        /// condition. Shifted forward by `&&` fusion.
        body_start: usize,
        /// Set at finalize when the branches turn out to be ternary arms.
        ternary_true: Option<OpId>,
    },
    Else {
        if_scope: ScopeId,
    },
    /// A loop whose condition is already structured (`while (cond)`).
    While {
        condition: OpId,
    },
    /// A loop with no recognized exit condition yet; the condition is the
    /// `true` constant until finalize rewrites it.
    InfiniteLoop {
        condition: OpId,
    },
    /// A `goto` onto itself: `while(true) {}`.
    EmptyInfiniteLoop,
    Switch {
        value: OpId,
        default_index: usize,
        /// Case value to handler instruction index, in table order.
        cases: IndexMap<i32, usize>,
    },
    Try,
    Catch {
        types: Vec<Type>,
        variable: VarId,
        /// Another handler follows this one.
        has_next: bool,
    },
}

/// One scope in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub start: usize,
    /// Exclusive end in instruction-index space.
    pub end: usize,
    pub parent: Option<ScopeId>,
    pub code: Vec<ScopeItem>,
    /// Lazily assigned loop label number; printed as `LabelN:`.
    pub label: Option<u32>,
    /// Detached by a rewrite; skipped when printing.
    pub removed: bool,
    pub finalized: bool,
}

impl Scope {
    /// Whether `break` may target this scope.
    pub fn breakable(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::While { .. } | ScopeKind::InfiniteLoop { .. } | ScopeKind::EmptyInfiniteLoop | ScopeKind::Switch { .. }
        )
    }

    /// Whether `continue` may target this scope.
    pub fn continuable(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::While { .. } | ScopeKind::InfiniteLoop { .. } | ScopeKind::EmptyInfiniteLoop
        )
    }

    pub fn is_loop(&self) -> bool {
        self.continuable()
    }
}

/// Arena of all scopes of one method body.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    next_label: u32,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: ScopeKind, start: usize, end: usize, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope count exceeds u32"));
        self.scopes.push(Scope {
            kind,
            start,
            end,
            parent,
            code: Vec::new(),
            label: None,
            removed: false,
            finalized: false,
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn add_item(&mut self, scope: ScopeId, item: Item, at: usize) {
        self.get_mut(scope).code.push(ScopeItem { item, at });
    }

    /// Detaches a scope from its parent's body.
    pub fn remove(&mut self, id: ScopeId) {
        self.get_mut(id).removed = true;
        if let Some(parent) = self.get(id).parent {
            self.get_mut(parent).code.retain(|entry| entry.item != Item::Scope(id));
        }
    }

    /// Returns the scope's label number, assigning the next free one on
    /// first use.
    pub fn label_of(&mut self, id: ScopeId) -> u32 {
        if let Some(label) = self.get(id).label {
            return label;
        }
        self.next_label += 1;
        let label = self.next_label;
        self.get_mut(id).label = Some(label);
        label
    }

    /// Innermost enclosing scope (including `from`) satisfying the
    /// predicate.
    pub fn find_enclosing(&self, from: ScopeId, predicate: impl Fn(&Scope) -> bool) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.get(id);
            if predicate(scope) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }
}
