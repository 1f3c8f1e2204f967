//! The decompilation pass: symbolic execution of the instruction stream.
//!
//! Instructions are visited strictly in index order. Each one pops its
//! inputs from the operand stack as expression trees and pushes a typed
//! expression node; void effects become statements of the current scope.
//! Blocks registered by the disassembly pass convert to scopes as the
//! index enters their ranges, and scopes finalize innermost-first as the
//! index leaves them. Everything here is single-threaded per method; the
//! only shared structure is the interval registry, which is read-only.

use smallvec::SmallVec;

use crate::{
    block::{Block, BlockKind, IfConditionKind},
    descriptor::{parse_method_descriptor, parse_type},
    disasm::{Disassembly, compare_kind},
    error::{DecompResult, Warning, WarningKind},
    insn::{ArithOp, ArrayKind, CmpKind, ConstPool, Constant, CpIndex, Instruction, NumKind, Opcode, ValueKind},
    op::{Args, BinOp, CompareKind, InvokeKind, OpArena, OpId, OpKind},
    scope::{Item, ScopeArena, ScopeId, ScopeKind},
    types::{ANY_INT, ANY_INT_OR_BOOLEAN, BYTE_OR_BOOLEAN, Primitive, Type, TypeStore},
    var::Locals,
};

/// Widest type a typed load or store of the given kind can produce.
fn kind_hint(kind: ValueKind) -> Type {
    match kind {
        ValueKind::Int => Type::Integral(ANY_INT_OR_BOOLEAN),
        ValueKind::Long => Type::LONG,
        ValueKind::Float => Type::FLOAT,
        ValueKind::Double => Type::DOUBLE,
        ValueKind::Reference => Type::AnyObject,
    }
}

fn bin_op(op: ArithOp) -> BinOp {
    match op {
        ArithOp::Add => BinOp::Add,
        ArithOp::Sub => BinOp::Sub,
        ArithOp::Mul => BinOp::Mul,
        ArithOp::Div => BinOp::Div,
        ArithOp::Rem => BinOp::Rem,
        ArithOp::Shl => BinOp::Shl,
        ArithOp::Shr => BinOp::Shr,
        ArithOp::Ushr => BinOp::Ushr,
        ArithOp::And => BinOp::BitAnd,
        ArithOp::Or => BinOp::BitOr,
        ArithOp::Xor => BinOp::BitXor,
    }
}

fn convert_target(to: NumKind) -> Primitive {
    match to {
        NumKind::Int => Primitive::Int,
        NumKind::Long => Primitive::Long,
        NumKind::Float => Primitive::Float,
        NumKind::Double => Primitive::Double,
        NumKind::Byte => Primitive::Byte,
        NumKind::Char => Primitive::Char,
        NumKind::Short => Primitive::Short,
    }
}

fn cmp_operand(kind: CmpKind) -> Type {
    match kind {
        CmpKind::Lcmp => Type::LONG,
        CmpKind::Fcmpl | CmpKind::Fcmpg => Type::FLOAT,
        CmpKind::Dcmpl | CmpKind::Dcmpg => Type::DOUBLE,
    }
}

/// Element type assumed when the array operand's type is still opaque.
fn default_element(kind: ArrayKind) -> Type {
    match kind {
        ArrayKind::Int => Type::INT,
        ArrayKind::Long => Type::LONG,
        ArrayKind::Float => Type::FLOAT,
        ArrayKind::Double => Type::DOUBLE,
        ArrayKind::Reference => Type::AnyObject,
        ArrayKind::Byte => Type::Integral(BYTE_OR_BOOLEAN),
        ArrayKind::Boolean => Type::BOOLEAN,
        ArrayKind::Char => Type::CHAR,
        ArrayKind::Short => Type::SHORT,
    }
}

fn element_primitive(kind: ArrayKind) -> Type {
    match kind {
        ArrayKind::Int => Type::INT,
        ArrayKind::Long => Type::LONG,
        ArrayKind::Float => Type::FLOAT,
        ArrayKind::Double => Type::DOUBLE,
        ArrayKind::Reference => Type::AnyObject,
        ArrayKind::Byte => Type::BYTE,
        ArrayKind::Boolean => Type::BOOLEAN,
        ArrayKind::Char => Type::CHAR,
        ArrayKind::Short => Type::SHORT,
    }
}

/// Narrows an operation's return type toward `target`, in place.
///
/// Variable loads narrow the variable itself; binary operators, ternaries
/// and negations propagate to their operands. Narrowing through an
/// aliased node is monotone, so every stack slot holding the same id sees
/// the refinement.
fn cast_operation(ops: &mut OpArena, locals: &mut Locals, store: &TypeStore, id: OpId, target: Type) -> Option<Type> {
    enum Walk {
        Var(crate::var::VarId),
        One(OpId),
        Two(OpId, OpId),
        SelfOnly,
    }
    let walk = match ops.kind(id) {
        OpKind::Load(v) => Walk::Var(*v),
        OpKind::Binary { lhs, rhs, .. } => Walk::Two(*lhs, *rhs),
        OpKind::Ternary { true_case, false_case, .. } => Walk::Two(*true_case, *false_case),
        OpKind::Negate(operand) => Walk::One(*operand),
        _ => Walk::SelfOnly,
    };
    match walk {
        Walk::Var(var) => {
            let refined = locals.narrow(var, target, store)?;
            ops.get_mut(id).ty = refined;
            Some(refined)
        }
        Walk::One(a) => {
            cast_operation(ops, locals, store, a, target)?;
            let refined = ops.ty(id).cast(target, store)?;
            ops.get_mut(id).ty = refined;
            Some(refined)
        }
        Walk::Two(a, b) => {
            cast_operation(ops, locals, store, a, target)?;
            cast_operation(ops, locals, store, b, target)?;
            let refined = ops.ty(id).cast(target, store)?;
            ops.get_mut(id).ty = refined;
            Some(refined)
        }
        Walk::SelfOnly => {
            let refined = ops.ty(id).cast(target, store)?;
            ops.get_mut(id).ty = refined;
            Some(refined)
        }
    }
}

/// Per-method decompilation state.
pub(crate) struct Decompiler<'a> {
    insns: &'a [Instruction],
    pool: &'a ConstPool,
    pub disasm: Disassembly,
    pub store: TypeStore,
    pub ops: OpArena,
    pub scopes: ScopeArena,
    pub locals: Locals,
    pub warnings: Vec<Warning>,
    stack: Vec<OpId>,
    scope_stack: Vec<ScopeId>,
    pub method_scope: ScopeId,
    ret_ty: Type,
    expr_start: usize,
    next_block: usize,
    index: usize,
}

impl<'a> Decompiler<'a> {
    pub fn new(
        insns: &'a [Instruction],
        pool: &'a ConstPool,
        disasm: Disassembly,
        store: TypeStore,
        locals: Locals,
        ret_ty: Type,
    ) -> Self {
        let mut scopes = ScopeArena::new();
        let method_scope = scopes.alloc(ScopeKind::Method, 0, insns.len(), None);
        Self {
            insns,
            pool,
            disasm,
            store,
            ops: OpArena::new(),
            scopes,
            locals,
            warnings: Vec::new(),
            stack: Vec::new(),
            scope_stack: vec![method_scope],
            method_scope,
            ret_ty,
            expr_start: 0,
            next_block: 0,
            index: 0,
        }
    }

    /// Runs the pass over the whole instruction stream.
    pub fn run(&mut self) -> DecompResult<()> {
        for index in 0..self.insns.len() {
            self.index = index;
            self.enter_blocks(index)?;
            if self.stack.is_empty() {
                self.expr_start = index;
            }
            let op = self.insns[index].op.clone();
            self.exec(index, &op)?;
            self.close_scopes(index + 1);
        }
        self.close_scopes(self.insns.len());
        if !self.stack.is_empty() {
            self.warn(WarningKind::DanglingValue);
            self.stack.clear();
        }
        Ok(())
    }

    /// Pushes the final variable types back into the tree: store values
    /// narrow toward their variable's settled type, and loads refresh
    /// their cached type. Later uses of a variable (a comparison, a
    /// return) can narrow it after earlier stores were built, so this
    /// runs once after the main walk.
    pub fn settle_types(&mut self) {
        for i in 0..self.ops.len() {
            let id = OpId(u32::try_from(i).expect("operation count exceeds u32"));
            if let OpKind::Store { var, value, .. } = *self.ops.kind(id) {
                let ty = self.locals.get(var).ty;
                let _ = cast_operation(&mut self.ops, &mut self.locals, &self.store, value, ty);
            }
        }
        for i in 0..self.ops.len() {
            let id = OpId(u32::try_from(i).expect("operation count exceeds u32"));
            if let OpKind::Load(var) = *self.ops.kind(id) {
                self.ops.get_mut(id).ty = self.locals.get(var).ty;
            }
        }
    }

    fn warn(&mut self, kind: WarningKind) {
        self.warnings.push(Warning { index: self.index, kind });
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack never empty")
    }

    fn add_statement(&mut self, op: OpId) {
        let scope = self.current_scope();
        self.scopes.add_item(scope, Item::Op(op), self.expr_start);
    }

    fn pop(&mut self) -> OpId {
        match self.stack.pop() {
            Some(id) => id,
            None => {
                self.warn(WarningKind::EmptyStack);
                self.ops.alloc(OpKind::Unknown, Type::Any)
            }
        }
    }

    fn peek(&mut self) -> OpId {
        match self.stack.last() {
            Some(&id) => id,
            None => {
                self.warn(WarningKind::EmptyStack);
                let id = self.ops.alloc(OpKind::Unknown, Type::Any);
                self.stack.push(id);
                id
            }
        }
    }

    /// Narrows an operation toward `target`, downgrading an impossible
    /// intersection to a warning and forcing the destination type.
    fn cast_op(&mut self, id: OpId, target: Type) {
        if cast_operation(&mut self.ops, &mut self.locals, &self.store, id, target).is_none() {
            let from = format!("{:?}", self.ops.ty(id));
            let to = format!("{target:?}");
            self.warn(WarningKind::ImpossibleIntersection { from, to });
            self.ops.get_mut(id).ty = target;
        }
    }

    fn pop_as(&mut self, target: Type) -> OpId {
        let id = self.pop();
        self.cast_op(id, target);
        id
    }

    fn unify(&mut self, a: Type, b: Type) -> Type {
        if let Some(t) = a.cast_to_widest(b, &self.store) {
            return t;
        }
        if let Some(t) = b.cast_to_widest(a, &self.store) {
            return t;
        }
        let (from, to) = (format!("{a:?}"), format!("{b:?}"));
        self.warn(WarningKind::ImpossibleIntersection { from, to });
        b
    }

    // === blocks -> scopes ===

    fn enter_blocks(&mut self, index: usize) -> DecompResult<()> {
        while self.next_block < self.disasm.blocks.len() && self.disasm.blocks[self.next_block].start == index {
            let block = self.disasm.blocks[self.next_block].clone();
            self.next_block += 1;
            self.convert_block(&block)?;
        }
        Ok(())
    }

    fn open_scope(&mut self, kind: ScopeKind, start: usize, end: usize, at: usize) -> ScopeId {
        let parent = self.current_scope();
        let id = self.scopes.alloc(kind, start, end, Some(parent));
        self.scopes.add_item(parent, Item::Scope(id), at);
        self.scope_stack.push(id);
        id
    }

    fn convert_block(&mut self, block: &Block) -> DecompResult<()> {
        match &block.kind {
            BlockKind::Loop => {
                let self_goto = block.end == block.start + 1
                    && matches!(self.insns[block.start].op, Opcode::Goto { .. });
                if self_goto {
                    self.open_scope(ScopeKind::EmptyInfiniteLoop, block.start, block.end, block.start);
                    self.disasm.consumed_gotos.insert(block.start);
                } else {
                    let condition = self.ops.alloc(OpKind::TrueConst, Type::BOOLEAN);
                    self.open_scope(ScopeKind::InfiniteLoop { condition }, block.start, block.end, block.start);
                }
            }
            BlockKind::Try => {
                self.open_scope(ScopeKind::Try, block.start, block.end, block.start);
            }
            BlockKind::Catch { types, has_next } => {
                let var_ty = if types.len() == 1 { types[0] } else { self.store.throwable() };
                let variable = self.locals.define_detached(var_ty);
                self.open_scope(
                    ScopeKind::Catch {
                        types: types.clone(),
                        variable,
                        has_next: *has_next,
                    },
                    block.start,
                    block.end,
                    block.start,
                );
                // the VM pushes the caught exception at handler entry
                let exception = self.ops.alloc(OpKind::Load(variable), var_ty);
                self.stack.push(exception);
            }
            BlockKind::Switch { default_index, cases, .. } => {
                let value = self.pop_as(Type::Integral(ANY_INT));
                self.open_scope(
                    ScopeKind::Switch {
                        value,
                        default_index: *default_index,
                        cases: cases.clone(),
                    },
                    block.start,
                    block.end,
                    block.start,
                );
            }
            BlockKind::If { condition, else_end } => {
                self.convert_if(block.end, *condition, *else_end)?;
            }
        }
        Ok(())
    }

    fn convert_if(&mut self, end: usize, condition_kind: IfConditionKind, else_end: Option<usize>) -> DecompResult<()> {
        let condition = self.build_condition(condition_kind);
        let condition = self.ops.invert(condition);

        let current = self.current_scope();
        if let ScopeKind::If {
            condition: old,
            body_start,
            else_scope,
            ..
        } = self.scopes.get(current).kind
        {
            let scope = self.scopes.get(current);
            // `a && b`: same end, and the new condition's expression is
            // the whole body so far
            if scope.code.is_empty() && body_start == self.expr_start && scope.end == end {
                let both_conditions =
                    self.ops.get(old).is_condition() && self.ops.get(condition).is_condition();
                let fused = self.ops.alloc(
                    OpKind::And {
                        lhs: old,
                        rhs: condition,
                        inverted: false,
                        condition_operands: both_conditions,
                    },
                    Type::BOOLEAN,
                );
                if let ScopeKind::If { condition, body_start, .. } = &mut self.scopes.get_mut(current).kind {
                    *condition = fused;
                    *body_start = self.index + 1;
                }
                return Ok(());
            }
            // `a || b`: the new branch sits at the old scope's end and
            // reaches further
            if end > scope.end && self.index == scope.end - 1 {
                let old_inverted = self.ops.invert(old);
                let both_conditions =
                    self.ops.get(old_inverted).is_condition() && self.ops.get(condition).is_condition();
                let fused = self.ops.alloc(
                    OpKind::Or {
                        lhs: old_inverted,
                        rhs: condition,
                        inverted: false,
                        condition_operands: both_conditions,
                    },
                    Type::BOOLEAN,
                );
                let inherited_else = else_scope;
                self.scope_stack.pop();
                self.scopes.remove(current);
                self.push_if_scope(fused, end, else_end, inherited_else);
                return Ok(());
            }
        }

        self.push_if_scope(condition, end, else_end, None);
        Ok(())
    }

    fn push_if_scope(&mut self, condition: OpId, end: usize, else_end: Option<usize>, inherited_else: Option<ScopeId>) {
        let parent = self.current_scope();
        let else_scope = inherited_else.or_else(|| {
            else_end.map(|else_end| {
                self.scopes
                    .alloc(ScopeKind::Else { if_scope: ScopeId(u32::MAX) }, end, else_end, Some(parent))
            })
        });
        let id = self.open_scope(
            ScopeKind::If {
                condition,
                else_scope,
                body_start: self.index + 1,
                ternary_true: None,
            },
            self.expr_start,
            end,
            self.expr_start,
        );
        if let Some(else_id) = else_scope {
            if let ScopeKind::Else { if_scope } = &mut self.scopes.get_mut(else_id).kind {
                *if_scope = id;
            }
        }
    }

    fn build_condition(&mut self, kind: IfConditionKind) -> OpId {
        match kind {
            IfConditionKind::CmpZero(compare) => {
                let operand = self.pop();
                if let OpKind::Cmp { lhs, rhs } = *self.ops.kind(operand) {
                    self.cast_op(lhs, compare.required_type());
                    self.cast_op(rhs, compare.required_type());
                    self.ops.alloc(
                        OpKind::CompareBinary {
                            kind: compare,
                            lhs,
                            rhs,
                            inverted: false,
                        },
                        Type::BOOLEAN,
                    )
                } else {
                    if !compare.is_equality() {
                        self.cast_op(operand, Type::ExcludingBoolean);
                    }
                    self.ops.alloc(
                        OpKind::CompareWithZero {
                            kind: compare,
                            operand,
                            inverted: false,
                        },
                        Type::BOOLEAN,
                    )
                }
            }
            IfConditionKind::ICmp(compare) => {
                let required = compare
                    .required_type()
                    .cast(Type::Integral(ANY_INT_OR_BOOLEAN), &self.store)
                    .unwrap_or(Type::Integral(ANY_INT));
                let rhs = self.pop_as(required);
                let lhs = self.pop_as(required);
                self.ops.alloc(
                    OpKind::CompareBinary {
                        kind: compare,
                        lhs,
                        rhs,
                        inverted: false,
                    },
                    Type::BOOLEAN,
                )
            }
            IfConditionKind::ACmp(compare) => {
                let rhs = self.pop_as(Type::AnyObject);
                let lhs = self.pop_as(Type::AnyObject);
                self.ops.alloc(
                    OpKind::CompareBinary {
                        kind: compare,
                        lhs,
                        rhs,
                        inverted: false,
                    },
                    Type::BOOLEAN,
                )
            }
            IfConditionKind::Null(compare) => {
                let operand = self.pop_as(Type::AnyObject);
                self.ops.alloc(
                    OpKind::CompareWithNull {
                        kind: compare,
                        operand,
                        inverted: false,
                    },
                    Type::BOOLEAN,
                )
            }
        }
    }

    // === scope closing ===

    fn close_scopes(&mut self, next: usize) {
        while self.scope_stack.len() > 1 {
            let top = *self.scope_stack.last().expect("scope stack never empty");
            if self.scopes.get(top).end > next {
                break;
            }
            self.scope_stack.pop();
            self.finalize_scope(top);
            if self.scopes.get(top).removed {
                continue;
            }
            if let ScopeKind::If { else_scope: Some(else_id), .. } = self.scopes.get(top).kind {
                let at = self.scopes.get(else_id).start;
                let parent = self.current_scope();
                self.scopes.add_item(parent, Item::Scope(else_id), at);
                self.scope_stack.push(else_id);
            }
        }
    }

    /// Runs a scope's one-shot finalize hook. Ternary detection and the
    /// loop-condition rewrite live here.
    fn finalize_scope(&mut self, id: ScopeId) {
        if self.scopes.get(id).finalized {
            return;
        }
        self.scopes.get_mut(id).finalized = true;

        match self.scopes.get(id).kind.clone() {
            ScopeKind::If { else_scope: Some(else_id), ternary_true: None, .. } => {
                let empty_bodies =
                    self.scopes.get(id).code.is_empty() && self.scopes.get(else_id).code.is_empty();
                if empty_bodies && !self.stack.is_empty() {
                    let true_case = self.stack.pop().expect("stack checked non-empty");
                    if let ScopeKind::If { ternary_true, .. } = &mut self.scopes.get_mut(id).kind {
                        *ternary_true = Some(true_case);
                    }
                }
            }
            ScopeKind::Else { if_scope } => self.finalize_else(id, if_scope),
            ScopeKind::InfiniteLoop { .. } => self.rewrite_loop_condition(id),
            _ => {}
        }
    }

    /// `if (cond) X else Y` with both bodies empty and values on the
    /// stack is a ternary; push it for the surrounding expression.
    fn finalize_else(&mut self, else_id: ScopeId, if_scope: ScopeId) {
        let (ternary_true, condition) = match self.scopes.get(if_scope).kind {
            ScopeKind::If { ternary_true, condition, .. } => (ternary_true, condition),
            _ => return,
        };
        let Some(true_case) = ternary_true else { return };
        let Some(false_case) = self.stack.pop() else {
            self.warn(WarningKind::MissingTernaryFalseCase);
            if let ScopeKind::If { ternary_true, .. } = &mut self.scopes.get_mut(if_scope).kind {
                *ternary_true = None;
            }
            return;
        };
        let result = match self.try_bool_collapse(condition, true_case, false_case) {
            Some(collapsed) => collapsed,
            None => {
                let ty = self.unify(self.ops.ty(true_case), self.ops.ty(false_case));
                self.ops.alloc(
                    OpKind::Ternary {
                        condition,
                        true_case,
                        false_case,
                    },
                    ty,
                )
            }
        };
        self.stack.push(result);
        self.expr_start = self.scopes.get(if_scope).start;
        self.scopes.remove(if_scope);
        self.scopes.remove(else_id);
    }

    /// `cond ? 1 : 0` collapses to `cond`; `cond ? 0 : 1` to `!cond`.
    /// Only fires while `boolean` is still a candidate for both arms.
    fn try_bool_collapse(&mut self, condition: OpId, true_case: OpId, false_case: OpId) -> Option<OpId> {
        let bool_possible = |ty: Type| {
            ty == Type::BOOLEAN || matches!(ty, Type::Integral(r) if r.include_boolean)
        };
        if !bool_possible(self.ops.ty(true_case)) || !bool_possible(self.ops.ty(false_case)) {
            return None;
        }
        let tv = match self.ops.kind(true_case) {
            OpKind::IntConst(v) => *v,
            _ => return None,
        };
        let fv = match self.ops.kind(false_case) {
            OpKind::IntConst(v) => *v,
            _ => return None,
        };
        match (tv, fv) {
            (1, 0) => Some(condition),
            (0, 1) => Some(self.ops.invert(condition)),
            _ => None,
        }
    }

    /// A `while(true)` whose body is a single `if` is really
    /// `while (cond)` with the `if`'s body.
    fn rewrite_loop_condition(&mut self, id: ScopeId) {
        let scope = self.scopes.get(id);
        if scope.code.len() != 1 {
            return;
        }
        let Item::Scope(inner) = scope.code[0].item else { return };
        let inner_scope = self.scopes.get(inner);
        if inner_scope.removed {
            return;
        }
        let ScopeKind::If { condition, else_scope: None, .. } = inner_scope.kind else {
            return;
        };
        let moved = inner_scope.code.clone();
        let loop_scope = self.scopes.get_mut(id);
        loop_scope.kind = ScopeKind::While { condition };
        loop_scope.code = moved.clone();
        self.scopes.get_mut(inner).removed = true;
        for entry in moved {
            if let Item::Scope(child) = entry.item {
                self.scopes.get_mut(child).parent = Some(id);
            }
        }
    }

    // === instruction dispatch ===

    fn exec(&mut self, index: usize, op: &Opcode) -> DecompResult<()> {
        match op {
            Opcode::Nop => {}

            Opcode::IConst(v) => {
                let id = self.ops.alloc(OpKind::IntConst(*v), Type::Integral(ANY_INT_OR_BOOLEAN));
                self.stack.push(id);
            }
            Opcode::LConst(v) => {
                let id = self.ops.alloc(OpKind::LongConst(*v), Type::LONG);
                self.stack.push(id);
            }
            Opcode::FConst(v) => {
                let id = self.ops.alloc(OpKind::FloatConst(*v), Type::FLOAT);
                self.stack.push(id);
            }
            Opcode::DConst(v) => {
                let id = self.ops.alloc(OpKind::DoubleConst(*v), Type::DOUBLE);
                self.stack.push(id);
            }
            Opcode::AConstNull => {
                let id = self.ops.alloc(OpKind::NullConst, Type::AnyObject);
                self.stack.push(id);
            }
            Opcode::Ldc(cp) => self.load_constant(*cp)?,

            Opcode::Load { kind, slot } => {
                let var = match self.locals.at_slot(*slot) {
                    Some(var) => var,
                    None => self.locals.define(*slot, kind_hint(*kind), None, false, false),
                };
                let id = self.ops.alloc(OpKind::Load(var), self.locals.get(var).ty);
                self.stack.push(id);
            }
            Opcode::Store { kind, slot } => self.store_local(*kind, *slot),
            Opcode::Iinc { slot, delta } => {
                let var = match self.locals.at_slot(*slot) {
                    Some(var) => var,
                    None => self.locals.define(*slot, Type::INT, None, false, false),
                };
                let _ = self.locals.narrow(var, Type::Integral(ANY_INT), &self.store);
                let id = self.ops.alloc(OpKind::Inc { var, delta: *delta }, Type::VOID);
                self.add_statement(id);
            }

            Opcode::Pop => {
                let id = self.pop();
                self.statement_if_call(id);
            }
            Opcode::Pop2 => {
                let id = self.pop();
                self.statement_if_call(id);
                if self.ops.ty(id).size() != crate::types::TypeSize::Eight {
                    let second = self.pop();
                    self.statement_if_call(second);
                }
            }
            Opcode::Dup => {
                let id = self.peek();
                self.stack.push(id);
            }
            Opcode::DupX1 => {
                let a = self.pop();
                let b = self.pop();
                self.stack.extend([a, b, a]);
            }
            Opcode::DupX2 => {
                let a = self.pop();
                let b = self.pop();
                if self.ops.ty(b).size() == crate::types::TypeSize::Eight {
                    self.stack.extend([a, b, a]);
                } else {
                    let c = self.pop();
                    self.stack.extend([a, c, b, a]);
                }
            }
            Opcode::Dup2 => {
                let a = self.pop();
                if self.ops.ty(a).size() == crate::types::TypeSize::Eight {
                    self.stack.extend([a, a]);
                } else {
                    let b = self.pop();
                    self.stack.extend([b, a, b, a]);
                }
            }
            Opcode::Dup2X1 => {
                let a = self.pop();
                if self.ops.ty(a).size() == crate::types::TypeSize::Eight {
                    let b = self.pop();
                    self.stack.extend([a, b, a]);
                } else {
                    let b = self.pop();
                    let c = self.pop();
                    self.stack.extend([b, a, c, b, a]);
                }
            }
            Opcode::Dup2X2 => {
                let a = self.pop();
                if self.ops.ty(a).size() == crate::types::TypeSize::Eight {
                    let b = self.pop();
                    if self.ops.ty(b).size() == crate::types::TypeSize::Eight {
                        self.stack.extend([a, b, a]);
                    } else {
                        let c = self.pop();
                        self.stack.extend([a, c, b, a]);
                    }
                } else {
                    let b = self.pop();
                    let c = self.pop();
                    if self.ops.ty(c).size() == crate::types::TypeSize::Eight {
                        self.stack.extend([b, a, c, b, a]);
                    } else {
                        let d = self.pop();
                        self.stack.extend([b, a, d, c, b, a]);
                    }
                }
            }
            Opcode::Swap => {
                let a = self.pop();
                let b = self.pop();
                self.stack.extend([a, b]);
            }

            Opcode::Arith { kind, op } => self.arithmetic(*kind, *op),
            Opcode::Neg { kind } => {
                let required = match kind {
                    ValueKind::Int => Type::Integral(ANY_INT),
                    other => kind_hint(*other),
                };
                let operand = self.pop_as(required);
                let ty = self.ops.ty(operand);
                let id = self.ops.alloc(OpKind::Negate(operand), ty);
                self.stack.push(id);
            }
            Opcode::Convert { from, to } => {
                let source = match from {
                    ValueKind::Int => Type::INT,
                    other => kind_hint(*other),
                };
                let value = self.pop_as(source);
                let target = Type::Primitive(convert_target(*to));
                let id = self.ops.alloc(OpKind::Cast { value, target }, target);
                self.stack.push(id);
            }
            Opcode::Cmp(kind) => {
                let operand_ty = cmp_operand(*kind);
                let rhs = self.pop_as(operand_ty);
                let lhs = self.pop_as(operand_ty);
                let id = self.ops.alloc(OpKind::Cmp { lhs, rhs }, Type::INT);
                self.stack.push(id);
            }

            Opcode::If { cond, offset } => {
                self.backward_branch(index, *offset, IfConditionKind::CmpZero(compare_kind(*cond)))?;
            }
            Opcode::IfICmp { cond, offset } => {
                self.backward_branch(index, *offset, IfConditionKind::ICmp(compare_kind(*cond)))?;
            }
            Opcode::IfACmp { equal, offset } => {
                let kind = if *equal { CompareKind::Equals } else { CompareKind::NotEquals };
                self.backward_branch(index, *offset, IfConditionKind::ACmp(kind))?;
            }
            Opcode::IfNull { offset } => {
                self.backward_branch(index, *offset, IfConditionKind::Null(CompareKind::Equals))?;
            }
            Opcode::IfNonNull { offset } => {
                self.backward_branch(index, *offset, IfConditionKind::Null(CompareKind::NotEquals))?;
            }
            Opcode::Goto { offset } => self.resolve_goto(index, *offset)?,
            Opcode::TableSwitch { .. } | Opcode::LookupSwitch { .. } => {
                // the switch block conversion already popped the value
            }

            Opcode::GetStatic(cp) => {
                let (class, name, descriptor) = self.field_ref(*cp)?;
                let owner = Type::Class(self.store.intern_class(&class)?);
                let ty = parse_type(&mut self.store, &descriptor)?;
                let id = self.ops.alloc(OpKind::GetField { class: owner, name, object: None }, ty);
                self.stack.push(id);
            }
            Opcode::PutStatic(cp) => {
                let (class, name, descriptor) = self.field_ref(*cp)?;
                let owner = Type::Class(self.store.intern_class(&class)?);
                let ty = parse_type(&mut self.store, &descriptor)?;
                let value = self.pop_as(ty);
                let id = self.ops.alloc(
                    OpKind::PutField {
                        class: owner,
                        name,
                        object: None,
                        value,
                    },
                    Type::VOID,
                );
                self.add_statement(id);
            }
            Opcode::GetField(cp) => {
                let (class, name, descriptor) = self.field_ref(*cp)?;
                let owner = Type::Class(self.store.intern_class(&class)?);
                let ty = parse_type(&mut self.store, &descriptor)?;
                let object = self.pop_as(owner);
                let id = self.ops.alloc(
                    OpKind::GetField {
                        class: owner,
                        name,
                        object: Some(object),
                    },
                    ty,
                );
                self.stack.push(id);
            }
            Opcode::PutField(cp) => {
                let (class, name, descriptor) = self.field_ref(*cp)?;
                let owner = Type::Class(self.store.intern_class(&class)?);
                let ty = parse_type(&mut self.store, &descriptor)?;
                let value = self.pop_as(ty);
                let object = self.pop_as(owner);
                let id = self.ops.alloc(
                    OpKind::PutField {
                        class: owner,
                        name,
                        object: Some(object),
                        value,
                    },
                    Type::VOID,
                );
                self.add_statement(id);
            }

            Opcode::InvokeVirtual(cp) => self.invoke(InvokeKind::Virtual, *cp)?,
            Opcode::InvokeSpecial(cp) => self.invoke(InvokeKind::Special, *cp)?,
            Opcode::InvokeStatic(cp) => self.invoke(InvokeKind::Static, *cp)?,
            Opcode::InvokeInterface(cp) => self.invoke(InvokeKind::Interface, *cp)?,

            Opcode::New(cp) => {
                let name = self.pool.class_name(*cp)?.to_owned();
                let ty = Type::Class(self.store.intern_class(&name)?);
                let id = self.ops.alloc(OpKind::New(ty), ty);
                self.stack.push(id);
            }
            Opcode::NewArray { element } => {
                let length = self.pop_as(Type::INT);
                let ty = self.store.intern_array(element_primitive(*element), 1);
                let id = self.ops.alloc(OpKind::NewArray { length }, ty);
                self.stack.push(id);
            }
            Opcode::ANewArray(cp) => {
                let name = self.pool.class_name(*cp)?.to_owned();
                let element = self.class_or_array(&name)?;
                let length = self.pop_as(Type::INT);
                let ty = self.store.intern_array(element, 1);
                let id = self.ops.alloc(OpKind::NewArray { length }, ty);
                self.stack.push(id);
            }
            Opcode::ArrayLength => {
                let array = self.pop();
                let id = self.ops.alloc(OpKind::ArrayLength(array), Type::INT);
                self.stack.push(id);
            }
            Opcode::ArrayLoad(kind) => {
                let index_op = self.pop_as(Type::INT);
                let array = self.pop();
                let element = match self.ops.ty(array) {
                    Type::Array(id) => self.store.element_type(id),
                    _ => default_element(*kind),
                };
                let id = self.ops.alloc(OpKind::ArrayLoad { array, index: index_op }, element);
                self.stack.push(id);
            }
            Opcode::ArrayStore(kind) => {
                let value = self.pop();
                let index_op = self.pop_as(Type::INT);
                let array = self.pop();
                let element = match self.ops.ty(array) {
                    Type::Array(id) => self.store.element_type(id),
                    _ => default_element(*kind),
                };
                self.cast_op(value, element);
                let id = self.ops.alloc(
                    OpKind::ArrayStore {
                        array,
                        index: index_op,
                        value,
                    },
                    Type::VOID,
                );
                self.add_statement(id);
            }

            Opcode::CheckCast(cp) => {
                let name = self.pool.class_name(*cp)?.to_owned();
                let target = self.class_or_array(&name)?;
                let value = self.pop();
                let id = self.ops.alloc(OpKind::Cast { value, target }, target);
                self.stack.push(id);
            }
            Opcode::InstanceOf(cp) => {
                let name = self.pool.class_name(*cp)?.to_owned();
                let class = self.class_or_array(&name)?;
                let value = self.pop_as(Type::AnyObject);
                let id = self.ops.alloc(OpKind::InstanceOf { value, class }, Type::BOOLEAN);
                self.stack.push(id);
            }

            Opcode::Return(kind) => {
                let value = match kind {
                    None => None,
                    Some(_) => {
                        let ret_ty = self.ret_ty;
                        Some(self.pop_as(ret_ty))
                    }
                };
                let id = self.ops.alloc(OpKind::Return(value), Type::VOID);
                self.add_statement(id);
            }
            Opcode::AThrow => {
                let throwable = self.store.throwable();
                let exception = self.pop_as(throwable);
                let id = self.ops.alloc(OpKind::Throw(exception), Type::VOID);
                self.add_statement(id);
            }
        }
        Ok(())
    }

    fn field_ref(&mut self, cp: CpIndex) -> DecompResult<(String, String, String)> {
        let (class, name, descriptor) = self.pool.field_ref(cp)?;
        Ok((class.to_owned(), name.to_owned(), descriptor.to_owned()))
    }

    /// Interns a constant-pool class reference that may itself be an
    /// array descriptor (`[I`, `[Ljava/lang/String;`).
    fn class_or_array(&mut self, name: &str) -> DecompResult<Type> {
        if name.starts_with('[') {
            parse_type(&mut self.store, name)
        } else {
            Ok(Type::Class(self.store.intern_class(name)?))
        }
    }

    fn load_constant(&mut self, cp: CpIndex) -> DecompResult<()> {
        let id = match self.pool.get(cp)?.clone() {
            Constant::Int(v) => self.ops.alloc(OpKind::IntConst(v), Type::Integral(ANY_INT_OR_BOOLEAN)),
            Constant::Long(v) => self.ops.alloc(OpKind::LongConst(v), Type::LONG),
            Constant::Float(v) => self.ops.alloc(OpKind::FloatConst(v), Type::FLOAT),
            Constant::Double(v) => self.ops.alloc(OpKind::DoubleConst(v), Type::DOUBLE),
            Constant::Str(v) => {
                let ty = self.store.string();
                self.ops.alloc(OpKind::StringConst(v), ty)
            }
            Constant::Class(name) => {
                let class = self.class_or_array(&name)?;
                let ty = self.store.class_class();
                self.ops.alloc(OpKind::ClassConst(class), ty)
            }
            Constant::Field { .. } | Constant::Method { .. } => {
                return Err(crate::error::DecompError::ConstantKindMismatch {
                    index: cp.0,
                    expected: "loadable constant",
                });
            }
        };
        self.stack.push(id);
        Ok(())
    }

    fn store_local(&mut self, kind: ValueKind, slot: u16) {
        let value = self.pop_as(kind_hint(kind));

        // handler entry: `astore` of the freshly pushed exception binds
        // the catch variable to its slot and emits nothing
        if let OpKind::Load(var) = *self.ops.kind(value) {
            if self.locals.get(var).slot.is_none() {
                self.locals.bind_slot(var, slot);
                return;
            }
        }

        let value_ty = self.ops.ty(value);
        let (var, declare) = match self.locals.at_slot(slot) {
            Some(var) => match self.locals.unify_store(var, value_ty, &self.store) {
                Some(unified) => {
                    self.cast_op(value, unified);
                    let declare = !self.locals.get(var).declared;
                    self.locals.get_mut(var).declared = true;
                    (var, declare)
                }
                None => {
                    // the slot is being reused for an unrelated type
                    let var = self.locals.define(slot, value_ty, None, false, false);
                    self.locals.get_mut(var).declared = true;
                    (var, true)
                }
            },
            None => {
                let var = self.locals.define(slot, value_ty, None, false, false);
                self.locals.get_mut(var).declared = true;
                (var, true)
            }
        };
        let id = self.ops.alloc(OpKind::Store { var, value, declare }, Type::VOID);
        self.add_statement(id);
    }

    fn arithmetic(&mut self, kind: ValueKind, op: ArithOp) {
        let bin = bin_op(op);
        let shift = matches!(op, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr);
        let (lhs, rhs, ty) = match kind {
            ValueKind::Int => {
                if shift {
                    let rhs = self.pop_as(Type::INT);
                    let lhs = self.pop_as(Type::Integral(ANY_INT));
                    let ty = self.ops.ty(lhs);
                    (lhs, rhs, ty)
                } else if bin.keeps_boolean() {
                    let rhs = self.pop_as(Type::Integral(ANY_INT_OR_BOOLEAN));
                    let lhs = self.pop_as(Type::Integral(ANY_INT_OR_BOOLEAN));
                    let ty = self.unify(self.ops.ty(lhs), self.ops.ty(rhs));
                    (lhs, rhs, ty)
                } else {
                    let rhs = self.pop_as(Type::Integral(ANY_INT));
                    let lhs = self.pop_as(Type::Integral(ANY_INT));
                    let ty = self.unify(self.ops.ty(lhs), self.ops.ty(rhs));
                    (lhs, rhs, ty)
                }
            }
            ValueKind::Long if shift => {
                let rhs = self.pop_as(Type::INT);
                let lhs = self.pop_as(Type::LONG);
                (lhs, rhs, Type::LONG)
            }
            other => {
                let operand = kind_hint(other);
                let rhs = self.pop_as(operand);
                let lhs = self.pop_as(operand);
                (lhs, rhs, operand)
            }
        };
        let id = self.ops.alloc(OpKind::Binary { op: bin, lhs, rhs }, ty);
        self.stack.push(id);
    }

    fn invoke(&mut self, kind: InvokeKind, cp: CpIndex) -> DecompResult<()> {
        let (class, name, descriptor) = {
            let (c, n, d) = self.pool.method_ref(cp)?;
            (c.to_owned(), n.to_owned(), d.to_owned())
        };
        let owner = Type::Class(self.store.intern_class(&class)?);
        let signature = parse_method_descriptor(&mut self.store, &descriptor)?;

        let mut args: Args = SmallVec::with_capacity(signature.params.len());
        for &param in signature.params.iter().rev() {
            args.push(self.pop_as(param));
        }
        args.reverse();

        if kind == InvokeKind::Special && name == "<init>" {
            let object = self.pop();
            if matches!(self.ops.kind(object), OpKind::New(_)) {
                // new X; dup; <init> collapses into `new X(args)`; every
                // stack alias of the object sees the rewrite
                let class_ty = self.ops.ty(object);
                let node = self.ops.get_mut(object);
                node.kind = OpKind::NewObject { class: class_ty, args };
                return Ok(());
            }
            // constructor chaining: super(...) / this(...)
            let id = self.ops.alloc(
                OpKind::Invoke {
                    kind,
                    class: owner,
                    name,
                    object: Some(object),
                    args,
                },
                Type::VOID,
            );
            self.add_statement(id);
            return Ok(());
        }

        let object = if kind == InvokeKind::Static {
            None
        } else {
            Some(self.pop_as(owner))
        };
        let id = self.ops.alloc(
            OpKind::Invoke {
                kind,
                class: owner,
                name,
                object,
                args,
            },
            signature.ret,
        );
        if signature.ret == Type::VOID {
            self.add_statement(id);
        } else {
            self.stack.push(id);
        }
        Ok(())
    }

    fn statement_if_call(&mut self, id: OpId) {
        if matches!(self.ops.kind(id), OpKind::Invoke { .. } | OpKind::NewObject { .. }) {
            self.add_statement(id);
        }
    }

    /// A conditional branch whose target is behind it closes a do-style
    /// loop; the branch renders as `if (cond) continue;`.
    fn backward_branch(&mut self, index: usize, offset: i32, condition_kind: IfConditionKind) -> DecompResult<()> {
        let target = self.disasm.target_index(index, offset)?;
        if target > index {
            return Ok(());
        }
        let condition = self.build_condition(condition_kind);
        let scope = self.open_scope(
            ScopeKind::If {
                condition,
                else_scope: None,
                body_start: index + 1,
                ternary_true: None,
            },
            self.expr_start,
            index + 1,
            self.expr_start,
        );
        match self
            .scopes
            .find_enclosing(scope, |s| s.continuable() && s.start == target)
        {
            Some(target_scope) => {
                self.mark_label_if_outer(target_scope, true);
                let id = self.ops.alloc(OpKind::Continue { target: target_scope }, Type::VOID);
                self.scopes.add_item(scope, Item::Op(id), index);
            }
            None => {
                self.warn(WarningKind::UnresolvedJump {
                    target_pos: self.disasm.positions[target],
                });
            }
        }
        Ok(())
    }

    fn resolve_goto(&mut self, index: usize, offset: i32) -> DecompResult<()> {
        if self.disasm.consumed_gotos.contains(&index) {
            return Ok(());
        }
        let target = self.disasm.target_index(index, offset)?;
        let current = self.current_scope();

        if target <= index {
            match self
                .scopes
                .find_enclosing(current, |s| s.continuable() && s.start == target)
            {
                Some(target_scope) => {
                    self.mark_label_if_outer(target_scope, true);
                    let id = self.ops.alloc(OpKind::Continue { target: target_scope }, Type::VOID);
                    self.add_statement(id);
                }
                None => self.warn(WarningKind::UnresolvedJump {
                    target_pos: self.disasm.positions[target],
                }),
            }
            return Ok(());
        }

        match self
            .scopes
            .find_enclosing(current, |s| s.breakable() && s.end == target)
        {
            Some(target_scope) => {
                self.mark_label_if_outer(target_scope, false);
                let id = self.ops.alloc(OpKind::Break { target: target_scope }, Type::VOID);
                self.add_statement(id);
            }
            None => {
                let target_pos = if target < self.disasm.positions.len() {
                    self.disasm.positions[target]
                } else {
                    self.disasm.positions.last().copied().unwrap_or(0)
                };
                self.warn(WarningKind::UnresolvedJump { target_pos });
            }
        }
        Ok(())
    }

    /// A `break`/`continue` that does not target the innermost candidate
    /// loop needs a label on its target.
    fn mark_label_if_outer(&mut self, target: ScopeId, continues: bool) {
        let current = self.current_scope();
        let innermost = self.scopes.find_enclosing(current, |s| {
            if continues { s.continuable() } else { s.breakable() }
        });
        if innermost != Some(target) {
            let _ = self.scopes.label_of(target);
        }
    }
}
