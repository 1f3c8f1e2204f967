//! The pre-parsed instruction stream and its companion tables.
//!
//! The class-file binary parser is an external collaborator; what reaches
//! the decompiler is an [`Instruction`] sequence with immediates already
//! decoded, plus the exception table, the optional local-variable debug
//! table, and a [`ConstPool`] resolver for strings, class names and
//! member references. Branch targets stay relative byte offsets, exactly
//! as the VM encodes them.

use serde::{Deserialize, Serialize};

use crate::error::{DecompError, DecompResult};

/// Index into the constant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpIndex(pub u16);

/// A resolved constant-pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A class reference by internal name.
    Class(String),
    Field {
        class: String,
        name: String,
        descriptor: String,
    },
    Method {
        class: String,
        name: String,
        descriptor: String,
    },
}

/// Constant pool resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstPool {
    pub entries: Vec<Constant>,
}

impl ConstPool {
    pub fn get(&self, index: CpIndex) -> DecompResult<&Constant> {
        self.entries
            .get(index.0 as usize)
            .ok_or(DecompError::ConstantOutOfRange { index: index.0 })
    }

    /// Resolves a class-reference entry to its internal name.
    pub fn class_name(&self, index: CpIndex) -> DecompResult<&str> {
        match self.get(index)? {
            Constant::Class(name) => Ok(name),
            _ => Err(DecompError::ConstantKindMismatch {
                index: index.0,
                expected: "class",
            }),
        }
    }

    /// Resolves a field-reference entry.
    pub fn field_ref(&self, index: CpIndex) -> DecompResult<(&str, &str, &str)> {
        match self.get(index)? {
            Constant::Field { class, name, descriptor } => Ok((class, name, descriptor)),
            _ => Err(DecompError::ConstantKindMismatch {
                index: index.0,
                expected: "field reference",
            }),
        }
    }

    /// Resolves a method-reference entry.
    pub fn method_ref(&self, index: CpIndex) -> DecompResult<(&str, &str, &str)> {
        match self.get(index)? {
            Constant::Method { class, name, descriptor } => Ok((class, name, descriptor)),
            _ => Err(DecompError::ConstantKindMismatch {
                index: index.0,
                expected: "method reference",
            }),
        }
    }
}

/// One exception-table entry, positions in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub start_pos: u32,
    pub end_pos: u32,
    pub handler_pos: u32,
    /// Internal class name of the caught type; `None` catches everything.
    pub catch_type: Option<String>,
}

/// One local-variable debug entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableEntry {
    pub slot: u16,
    pub start_pc: u32,
    pub end_pc: u32,
    pub name: String,
    pub descriptor: String,
}

/// Operand kind of typed loads, stores, arithmetic and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

/// Arithmetic, shift and bitwise opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

/// Targets of the primitive conversion opcodes (`i2l`, `i2b`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
}

/// The two-word comparison opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpKind {
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
}

/// Condition of the one- and two-operand integer branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// Element kind of the array opcodes. `Boolean` only appears in
/// `newarray`; the access opcodes use `Byte` for `boolean[]` too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Byte,
    Boolean,
    Char,
    Short,
}

/// A decoded instruction. Constant-pool indices are left symbolic so the
/// pool resolves them; branch offsets are relative to the instruction's
/// own position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    Nop,
    IConst(i32),
    LConst(i64),
    FConst(f32),
    DConst(f64),
    AConstNull,
    Ldc(CpIndex),
    Load { kind: ValueKind, slot: u16 },
    Store { kind: ValueKind, slot: u16 },
    Iinc { slot: u16, delta: i16 },
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arith { kind: ValueKind, op: ArithOp },
    Neg { kind: ValueKind },
    Convert { from: ValueKind, to: NumKind },
    Cmp(CmpKind),
    If { cond: IfCond, offset: i32 },
    IfICmp { cond: IfCond, offset: i32 },
    IfACmp { equal: bool, offset: i32 },
    IfNull { offset: i32 },
    IfNonNull { offset: i32 },
    Goto { offset: i32 },
    TableSwitch { default_offset: i32, low: i32, offsets: Vec<i32> },
    LookupSwitch { default_offset: i32, pairs: Vec<(i32, i32)> },
    GetStatic(CpIndex),
    PutStatic(CpIndex),
    GetField(CpIndex),
    PutField(CpIndex),
    InvokeVirtual(CpIndex),
    InvokeSpecial(CpIndex),
    InvokeStatic(CpIndex),
    InvokeInterface(CpIndex),
    New(CpIndex),
    NewArray { element: ArrayKind },
    ANewArray(CpIndex),
    ArrayLength,
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),
    CheckCast(CpIndex),
    InstanceOf(CpIndex),
    Return(Option<ValueKind>),
    AThrow,
}

/// An instruction with its byte position in the method's code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub pos: u32,
    pub op: Opcode,
}

impl Instruction {
    pub fn new(pos: u32, op: Opcode) -> Self {
        Self { pos, op }
    }
}
