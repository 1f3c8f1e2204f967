//! The expression AST built by symbolic execution.
//!
//! Operations live in an arena ([`OpArena`]) and reference each other by
//! [`OpId`], so a node pushed once and duplicated on the stack (`dup`) is
//! shared, and refining its return type in place is visible everywhere it
//! is used. Every operation carries a return type and a precedence; the
//! printer uses the precedence to decide parenthesization.

use smallvec::SmallVec;

use crate::{
    scope::ScopeId,
    types::Type,
    var::VarId,
};

/// Index of an operation in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(pub(crate) u32);

/// Precedence classes, weakest binding first.
pub mod prio {
    pub const ASSIGNMENT: u8 = 1;
    pub const TERNARY: u8 = 2;
    pub const LOGICAL_OR: u8 = 3;
    pub const LOGICAL_AND: u8 = 4;
    pub const BIT_OR: u8 = 5;
    pub const BIT_XOR: u8 = 6;
    pub const BIT_AND: u8 = 7;
    pub const EQUALS_COMPARISON: u8 = 8;
    pub const GREATER_LESS_COMPARISON: u8 = 9;
    pub const SHIFT: u8 = 10;
    pub const ADDITIVE: u8 = 11;
    pub const MULTIPLICATIVE: u8 = 12;
    pub const UNARY: u8 = 13;
    pub const POSTFIX: u8 = 14;
    pub const ATOM: u8 = 15;
}

/// Which side of an operator a child sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Binary arithmetic, shift and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinOp {
    pub fn operator(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Ushr => ">>>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }

    pub fn priority(self) -> u8 {
        match self {
            Self::Add | Self::Sub => prio::ADDITIVE,
            Self::Mul | Self::Div | Self::Rem => prio::MULTIPLICATIVE,
            Self::Shl | Self::Shr | Self::Ushr => prio::SHIFT,
            Self::BitAnd => prio::BIT_AND,
            Self::BitOr => prio::BIT_OR,
            Self::BitXor => prio::BIT_XOR,
        }
    }

    /// The bitwise operators preserve `boolean`ness of their operands.
    pub fn keeps_boolean(self) -> bool {
        matches!(self, Self::BitAnd | Self::BitOr | Self::BitXor)
    }
}

/// Comparison operators with their inversion partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Equals,
    NotEquals,
    Greater,
    LessOrEquals,
    Less,
    GreaterOrEquals,
}

impl CompareKind {
    pub fn operator(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Greater => ">",
            Self::LessOrEquals => "<=",
            Self::Less => "<",
            Self::GreaterOrEquals => ">=",
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Self::Equals => Self::NotEquals,
            Self::NotEquals => Self::Equals,
            Self::Greater => Self::LessOrEquals,
            Self::LessOrEquals => Self::Greater,
            Self::Less => Self::GreaterOrEquals,
            Self::GreaterOrEquals => Self::Less,
        }
    }

    /// Operator actually rendered, honoring an inversion flag.
    pub fn rendered(self, inverted: bool) -> &'static str {
        if inverted { self.inverted().operator() } else { self.operator() }
    }

    /// `==`/`!=` compare anything; the ordering compares exclude `boolean`.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }

    /// Prefix rendered for a bare boolean operand (`!flag` over
    /// `flag == false`).
    pub fn unary_operator(self, inverted: bool) -> &'static str {
        let kind = if inverted { self.inverted() } else { self };
        match kind {
            Self::Equals => "!",
            _ => "",
        }
    }

    pub fn required_type(self) -> Type {
        if self.is_equality() { Type::Any } else { Type::ExcludingBoolean }
    }

    pub fn priority(self) -> u8 {
        if self.is_equality() {
            prio::EQUALS_COMPARISON
        } else {
            prio::GREATER_LESS_COMPARISON
        }
    }
}

/// Dispatch kind of a method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Argument list storage; nearly all calls have few arguments.
pub type Args = SmallVec<[OpId; 4]>;

/// An expression or statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    IntConst(i32),
    LongConst(i64),
    FloatConst(f32),
    DoubleConst(f64),
    StringConst(String),
    ClassConst(Type),
    NullConst,
    /// Condition of an untransformed infinite loop.
    TrueConst,

    Load(VarId),
    Store { var: VarId, value: OpId, declare: bool },
    Inc { var: VarId, delta: i16 },

    Binary { op: BinOp, lhs: OpId, rhs: OpId },
    Negate(OpId),
    Cast { value: OpId, target: Type },
    InstanceOf { value: OpId, class: Type },
    /// `lcmp`/`fcmp*`/`dcmp*`: holds both operands until the following
    /// branch repackages them. Never printed.
    Cmp { lhs: OpId, rhs: OpId },

    CompareBinary { kind: CompareKind, lhs: OpId, rhs: OpId, inverted: bool },
    CompareWithZero { kind: CompareKind, operand: OpId, inverted: bool },
    CompareWithNull { kind: CompareKind, operand: OpId, inverted: bool },
    And { lhs: OpId, rhs: OpId, inverted: bool, condition_operands: bool },
    Or { lhs: OpId, rhs: OpId, inverted: bool, condition_operands: bool },
    Ternary { condition: OpId, true_case: OpId, false_case: OpId },

    GetField { class: Type, name: String, object: Option<OpId> },
    PutField { class: Type, name: String, object: Option<OpId>, value: OpId },
    ArrayLoad { array: OpId, index: OpId },
    ArrayStore { array: OpId, index: OpId, value: OpId },
    ArrayLength(OpId),
    NewArray { length: OpId },

    /// Freshly allocated, not yet constructed. Rewritten into
    /// [`OpKind::NewObject`] by the `<init>` call.
    New(Type),
    NewObject { class: Type, args: Args },
    Invoke { kind: InvokeKind, class: Type, name: String, object: Option<OpId>, args: Args },

    Return(Option<OpId>),
    Throw(OpId),
    Break { target: ScopeId },
    Continue { target: ScopeId },

    /// Placeholder substituted when the operand stack underflowed.
    Unknown,
}

/// A node in the arena: kind plus current return type.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub ty: Type,
}

impl Operation {
    /// Precedence of the rendered form.
    pub fn priority(&self) -> u8 {
        match &self.kind {
            OpKind::IntConst(v) => {
                if *v < 0 {
                    prio::UNARY
                } else {
                    prio::ATOM
                }
            }
            OpKind::LongConst(v) => {
                if *v < 0 {
                    prio::UNARY
                } else {
                    prio::ATOM
                }
            }
            OpKind::FloatConst(v) => {
                if *v < 0.0 {
                    prio::UNARY
                } else {
                    prio::ATOM
                }
            }
            OpKind::DoubleConst(v) => {
                if *v < 0.0 {
                    prio::UNARY
                } else {
                    prio::ATOM
                }
            }
            OpKind::StringConst(_) | OpKind::ClassConst(_) | OpKind::NullConst | OpKind::TrueConst | OpKind::Load(_)
            | OpKind::Unknown => prio::ATOM,
            OpKind::Store { .. } | OpKind::PutField { .. } => prio::ASSIGNMENT,
            OpKind::Inc { .. } => prio::UNARY,
            OpKind::Binary { op, .. } => op.priority(),
            OpKind::Negate(_) | OpKind::Cast { .. } => prio::UNARY,
            OpKind::InstanceOf { .. } => prio::GREATER_LESS_COMPARISON,
            OpKind::Cmp { .. } => prio::ATOM,
            OpKind::CompareBinary { kind, .. } | OpKind::CompareWithZero { kind, .. }
            | OpKind::CompareWithNull { kind, .. } => kind.priority(),
            OpKind::And { inverted, condition_operands, .. } => {
                if *inverted && *condition_operands {
                    prio::LOGICAL_OR
                } else {
                    prio::LOGICAL_AND
                }
            }
            OpKind::Or { inverted, condition_operands, .. } => {
                if *inverted && *condition_operands {
                    prio::LOGICAL_AND
                } else {
                    prio::LOGICAL_OR
                }
            }
            OpKind::Ternary { .. } => prio::TERNARY,
            OpKind::GetField { .. } | OpKind::ArrayLoad { .. } | OpKind::ArrayLength(_) | OpKind::NewArray { .. }
            | OpKind::NewObject { .. } | OpKind::Invoke { .. } | OpKind::New(_) => prio::POSTFIX,
            OpKind::ArrayStore { .. } => prio::ASSIGNMENT,
            OpKind::Return(_) | OpKind::Throw(_) | OpKind::Break { .. } | OpKind::Continue { .. } => prio::ATOM,
        }
    }

    /// Whether this node is a boolean condition with an inversion flag.
    pub fn is_condition(&self) -> bool {
        matches!(
            self.kind,
            OpKind::CompareBinary { .. }
                | OpKind::CompareWithZero { .. }
                | OpKind::CompareWithNull { .. }
                | OpKind::And { .. }
                | OpKind::Or { .. }
                | OpKind::TrueConst
        )
    }
}

/// Arena of all operations of one method body.
#[derive(Debug, Default)]
pub struct OpArena {
    ops: Vec<Operation>,
}

impl OpArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: OpKind, ty: Type) -> OpId {
        let id = OpId(u32::try_from(self.ops.len()).expect("operation count exceeds u32"));
        self.ops.push(Operation { kind, ty });
        id
    }

    pub fn get(&self, id: OpId) -> &Operation {
        &self.ops[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: OpId) -> &mut Operation {
        &mut self.ops[id.0 as usize]
    }

    pub fn kind(&self, id: OpId) -> &OpKind {
        &self.get(id).kind
    }

    pub fn ty(&self, id: OpId) -> Type {
        self.get(id).ty
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Toggles the polarity of a condition. Inverting an `&&`/`||` whose
    /// operands are themselves conditions inverts the operands too, which
    /// is what turns `!(a && b)` into `!a || !b`.
    pub fn invert(&mut self, id: OpId) -> OpId {
        let (invert_lhs, invert_rhs) = match &mut self.get_mut(id).kind {
            OpKind::CompareBinary { inverted, .. }
            | OpKind::CompareWithZero { inverted, .. }
            | OpKind::CompareWithNull { inverted, .. } => {
                *inverted = !*inverted;
                (None, None)
            }
            OpKind::And { lhs, rhs, inverted, condition_operands }
            | OpKind::Or { lhs, rhs, inverted, condition_operands } => {
                *inverted = !*inverted;
                if *condition_operands {
                    (Some(*lhs), Some(*rhs))
                } else {
                    (None, None)
                }
            }
            _ => (None, None),
        };
        if let Some(lhs) = invert_lhs {
            self.invert(lhs);
        }
        if let Some(rhs) = invert_rhs {
            self.invert(rhs);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ANY_INT_OR_BOOLEAN, Type};

    fn int_const(arena: &mut OpArena, value: i32) -> OpId {
        arena.alloc(OpKind::IntConst(value), Type::Integral(ANY_INT_OR_BOOLEAN))
    }

    #[test]
    fn test_compare_kind_inversion_pairs() {
        assert_eq!(CompareKind::Equals.inverted(), CompareKind::NotEquals);
        assert_eq!(CompareKind::Greater.inverted(), CompareKind::LessOrEquals);
        assert_eq!(CompareKind::Less.inverted(), CompareKind::GreaterOrEquals);
        for kind in [
            CompareKind::Equals,
            CompareKind::NotEquals,
            CompareKind::Greater,
            CompareKind::LessOrEquals,
            CompareKind::Less,
            CompareKind::GreaterOrEquals,
        ] {
            assert_eq!(kind.inverted().inverted(), kind);
        }
    }

    #[test]
    fn test_invert_and_flips_operands() {
        let mut arena = OpArena::new();
        let a = int_const(&mut arena, 1);
        let b = int_const(&mut arena, 2);
        let left = arena.alloc(
            OpKind::CompareWithZero {
                kind: CompareKind::NotEquals,
                operand: a,
                inverted: false,
            },
            Type::BOOLEAN,
        );
        let right = arena.alloc(
            OpKind::CompareWithZero {
                kind: CompareKind::NotEquals,
                operand: b,
                inverted: false,
            },
            Type::BOOLEAN,
        );
        let and = arena.alloc(
            OpKind::And {
                lhs: left,
                rhs: right,
                inverted: false,
                condition_operands: true,
            },
            Type::BOOLEAN,
        );
        arena.invert(and);
        assert!(matches!(arena.kind(and), OpKind::And { inverted: true, .. }));
        assert!(matches!(arena.kind(left), OpKind::CompareWithZero { inverted: true, .. }));
        assert!(matches!(arena.kind(right), OpKind::CompareWithZero { inverted: true, .. }));
        // inverted && over condition operands renders as ||
        assert_eq!(arena.get(and).priority(), prio::LOGICAL_OR);
    }

    #[test]
    fn test_negative_constants_bind_like_unary() {
        let mut arena = OpArena::new();
        let neg = int_const(&mut arena, -1);
        let pos = int_const(&mut arena, 1);
        assert_eq!(arena.get(neg).priority(), prio::UNARY);
        assert_eq!(arena.get(pos).priority(), prio::ATOM);
    }
}
