//! Interned capacity-interval types.
//!
//! The operand stack of the VM does not distinguish `boolean`, `byte`,
//! `char`, `short` and `int`; an [`IntegralRange`] stands in for an
//! integer value whose concrete width is not yet known. Every use of the
//! value (a store into a typed local, an arithmetic coercion, a
//! comparison) narrows the interval until a single primitive is forced.
//!
//! The canonical instances are enumerated eagerly into a process-wide
//! registry (there are 24 of them), so lookup never mutates shared state
//! and concurrent method decompilation needs no lock.

use std::sync::LazyLock;

use super::Primitive;

/// Stack capacity of `char` in bytes.
pub const CHAR_CAPACITY: u8 = 2;

/// An integral type of not-yet-determined width.
///
/// `min`/`max` bound the capacity in bytes (1, 2 or 4); the flags record
/// whether `boolean` and `char` are still candidates. Narrowing only ever
/// shrinks the interval and clears flags, so refinement through aliased
/// references is monotone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegralRange {
    pub min: u8,
    pub max: u8,
    pub include_boolean: bool,
    pub include_char: bool,
}

/// Any of `boolean`, `byte`, `char`, `short`, `int`: what an `iconst`
/// pushes before anything is known about it.
pub const ANY_INT_OR_BOOLEAN: IntegralRange = IntegralRange::new(1, 4, true, true);
/// Any of `byte`, `char`, `short`, `int`.
pub const ANY_INT: IntegralRange = IntegralRange::new(1, 4, false, true);
/// Any of `byte`, `short`, `int`.
pub const ANY_SIGNED_INT: IntegralRange = IntegralRange::new(1, 4, false, false);
/// Any of `char`, `short`, `int`.
pub const CHAR_OR_SHORT_OR_INT: IntegralRange = IntegralRange::new(2, 4, false, true);
/// `char` or `int`.
pub const CHAR_OR_INT: IntegralRange = IntegralRange::new(4, 4, false, true);
/// `short` or `int`.
pub const SHORT_OR_INT: IntegralRange = IntegralRange::new(2, 4, false, false);
/// `byte` or `boolean`: what a `baload` pushes.
pub const BYTE_OR_BOOLEAN: IntegralRange = IntegralRange::new(1, 1, true, false);
/// `int` or `boolean`: what the bitwise operators preserve.
pub const INT_OR_BOOLEAN: IntegralRange = IntegralRange::new(4, 4, true, false);

/// Every canonical instance. `get_instance` resolves against this set,
/// which keeps the key tuple injective and the instance count bounded.
static INSTANCES: LazyLock<Vec<IntegralRange>> = LazyLock::new(|| {
    let mut instances = Vec::new();
    for min in [1u8, 2, 4] {
        for max in [1u8, 2, 4] {
            if min > max {
                continue;
            }
            for include_boolean in [false, true] {
                for include_char in [false, true] {
                    instances.push(IntegralRange::new(min, max, include_boolean, include_char));
                }
            }
        }
    }
    instances
});

impl IntegralRange {
    const fn new(min: u8, max: u8, include_boolean: bool, include_char: bool) -> Self {
        Self {
            min,
            max,
            include_boolean,
            include_char,
        }
    }

    /// Returns the canonical instance for the tuple, or `None` when the
    /// interval is empty (`min > max`) or uses a capacity the VM has no
    /// integral type for.
    pub fn get_instance(min: u8, max: u8, include_boolean: bool, include_char: bool) -> Option<Self> {
        if min > max {
            return None;
        }
        INSTANCES
            .iter()
            .copied()
            .find(|r| r.min == min && r.max == max && r.include_boolean == include_boolean && r.include_char == include_char)
    }

    /// The widest primitive still inside the interval. Used as the
    /// rendered type when nothing ever forced a narrower one.
    pub fn high_primitive(self) -> Primitive {
        if self.include_char && self.max == CHAR_CAPACITY {
            return Primitive::Char;
        }
        match self.max {
            1 => Primitive::Byte,
            2 => Primitive::Short,
            _ => Primitive::Int,
        }
    }

    /// The primitive an unresolved interval crystallizes to: `boolean`
    /// when still possible, otherwise the widest candidate.
    pub fn reduced(self) -> Primitive {
        if self.include_boolean {
            Primitive::Boolean
        } else {
            self.high_primitive()
        }
    }
}
