#![doc = include_str!("../../../README.md")]

mod block;
mod decompile;
mod disasm;

pub mod config;
pub mod descriptor;
pub mod error;
pub mod insn;
pub mod method;
pub mod op;
pub mod scope;
pub mod stringify;
pub mod types;
pub mod var;

pub use crate::{
    config::Config,
    error::{DecompError, DecompResult, Warning, WarningKind},
    insn::{
        ArithOp, ArrayKind, CmpKind, ConstPool, Constant, CpIndex, ExceptionEntry, IfCond, Instruction,
        LocalVariableEntry, NumKind, Opcode, ValueKind,
    },
    method::{MethodInput, MethodOutput, decompile_method},
};
