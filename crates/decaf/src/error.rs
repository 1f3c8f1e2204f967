//! Error and diagnostic types for the decompiler core.
//!
//! Two severity levels exist. `DecompError` is fatal for the enclosing
//! method: malformed descriptors, out-of-range branches, or violated
//! internal invariants. `Warning` covers recoverable inference failures;
//! the decompiler substitutes the widest still-consistent type and keeps
//! going, accumulating warnings on a per-method diagnostics list.

use std::fmt::{self, Display};

/// Result type alias for operations that can fail a whole method.
pub type DecompResult<T> = Result<T, DecompError>;

/// Fatal decompilation error. Caught at the method boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompError {
    /// A field or method descriptor could not be parsed.
    InvalidDescriptor { descriptor: String, at: usize },
    /// A class name contains characters the VM forbids.
    InvalidClassName { name: String, at: usize },
    /// A branch or switch target lands outside the method's code.
    BranchOutOfRange { pos: u32, target: i64 },
    /// A constant-pool index points past the end of the pool.
    ConstantOutOfRange { index: u16 },
    /// A constant-pool entry has the wrong kind for the referencing instruction.
    ConstantKindMismatch { index: u16, expected: &'static str },
    /// An internal invariant was violated. Indicates a bug, not bad input.
    Internal(String),
}

impl Display for DecompError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptor { descriptor, at } => {
                write!(f, "invalid descriptor {descriptor:?} at offset {at}")
            }
            Self::InvalidClassName { name, at } => {
                write!(f, "invalid class name {name:?} at offset {at}")
            }
            Self::BranchOutOfRange { pos, target } => {
                write!(f, "branch at position {pos} targets {target}, which is outside the method")
            }
            Self::ConstantOutOfRange { index } => {
                write!(f, "constant pool index {index} is out of range")
            }
            Self::ConstantKindMismatch { index, expected } => {
                write!(f, "constant pool entry {index} is not a {expected}")
            }
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for DecompError {}

impl DecompError {
    /// Builds an internal-invariant error with context.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// A recoverable inference problem, reported but not fatal.
///
/// Warnings never abort decompilation; they accumulate per method and are
/// surfaced to the caller through [`crate::MethodOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Instruction index the problem was detected at.
    pub index: usize,
    pub kind: WarningKind,
}

/// What went wrong during inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A consumer popped from an empty operand stack; an unknown-typed
    /// placeholder was substituted.
    EmptyStack,
    /// Two type constraints on the same value had an empty intersection;
    /// the destination type won.
    ImpossibleIntersection { from: String, to: String },
    /// A value left on the stack had no consumer and was dropped.
    DanglingValue,
    /// A ternary rewrite expected a false case on the stack and found none.
    MissingTernaryFalseCase,
    /// An unconditional jump could not be resolved to break/continue/else.
    UnresolvedJump { target_pos: u32 },
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at instruction {}: ", self.index)?;
        match &self.kind {
            WarningKind::EmptyStack => write!(f, "operand stack was empty at a consumer"),
            WarningKind::ImpossibleIntersection { from, to } => {
                write!(f, "cannot reconcile type {from} with {to}; using {to}")
            }
            WarningKind::DanglingValue => write!(f, "a computed value was never consumed"),
            WarningKind::MissingTernaryFalseCase => {
                write!(f, "fail to indicate false case of ternary operator")
            }
            WarningKind::UnresolvedJump { target_pos } => {
                write!(f, "unconditional jump to position {target_pos} could not be structured")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecompError::InvalidDescriptor {
            descriptor: "(II".to_owned(),
            at: 3,
        };
        assert_eq!(err.to_string(), "invalid descriptor \"(II\" at offset 3");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning {
            index: 7,
            kind: WarningKind::EmptyStack,
        };
        assert_eq!(warning.to_string(), "at instruction 7: operand stack was empty at a consumer");
    }
}
