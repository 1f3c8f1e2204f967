//! The disassembly pass.
//!
//! Walks the instruction stream once, builds the position-to-index
//! mapping, and registers structural [`Block`]s: conditional branches
//! open `if` regions, backward `goto`s open loops, switches record their
//! offset tables, and the exception table erects `try`/`catch` pairs.
//! Forward `goto`s are resolved structurally where possible: a jump
//! terminating a conditional body attaches an `else` region, a jump out
//! of a `try` or `catch` body closes the handler chain, and a jump out of
//! a `switch` pins its end. Whatever stays unresolved is left for the
//! decompilation pass to turn into `break`/`continue`.

use ahash::AHashMap;
use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    block::{Block, BlockKind, IfConditionKind},
    error::{DecompError, DecompResult},
    insn::{ExceptionEntry, IfCond, Instruction, Opcode},
    op::CompareKind,
    types::{Type, TypeStore},
};

/// Output of the disassembly pass.
#[derive(Debug)]
pub struct Disassembly {
    /// Structural regions, sorted outermost-first per start index.
    pub blocks: Vec<Block>,
    /// Indices of `goto`s already folded into structure (else attachment,
    /// handler-chain exits); the decompilation pass skips them.
    pub consumed_gotos: AHashSet<usize>,
    /// Byte position of every instruction, by index.
    pub positions: Vec<u32>,
    pos_index: AHashMap<u32, usize>,
    code_len: usize,
}

impl Disassembly {
    /// Translates a byte position into an instruction index. A position
    /// one past the last instruction maps to the code length, so branches
    /// to the method end stay representable.
    pub fn pos_to_index(&self, pos: i64) -> DecompResult<usize> {
        if let Ok(pos32) = u32::try_from(pos) {
            if let Some(&index) = self.pos_index.get(&pos32) {
                return Ok(index);
            }
            if self.positions.last().is_none_or(|&last| pos32 > last) {
                return Ok(self.code_len);
            }
        }
        Err(DecompError::BranchOutOfRange {
            pos: *self.positions.first().unwrap_or(&0),
            target: pos,
        })
    }

    /// Resolves a relative branch offset at `index` to a target index.
    pub(crate) fn target_index(&self, index: usize, offset: i32) -> DecompResult<usize> {
        let target = i64::from(self.positions[index]) + i64::from(offset);
        self.pos_to_index(target).map_err(|_| DecompError::BranchOutOfRange {
            pos: self.positions[index],
            target,
        })
    }

    /// Innermost block satisfying the predicate that contains `index`.
    fn innermost_containing(&self, index: usize, predicate: impl Fn(&Block) -> bool) -> Option<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.contains(index) && predicate(b))
            .max_by_key(|(_, b)| b.start)
            .map(|(i, _)| i)
    }
}

pub(crate) fn compare_kind(cond: IfCond) -> CompareKind {
    match cond {
        IfCond::Eq => CompareKind::Equals,
        IfCond::Ne => CompareKind::NotEquals,
        IfCond::Lt => CompareKind::Less,
        IfCond::Ge => CompareKind::GreaterOrEquals,
        IfCond::Gt => CompareKind::Greater,
        IfCond::Le => CompareKind::LessOrEquals,
    }
}

/// Runs the disassembly pass.
pub fn disassemble(
    insns: &[Instruction],
    exception_table: &[ExceptionEntry],
    store: &mut TypeStore,
) -> DecompResult<Disassembly> {
    let mut disasm = Disassembly {
        blocks: Vec::new(),
        consumed_gotos: AHashSet::new(),
        positions: insns.iter().map(|i| i.pos).collect(),
        pos_index: insns.iter().enumerate().map(|(i, insn)| (insn.pos, i)).collect(),
        code_len: insns.len(),
    };

    register_exception_blocks(&mut disasm, exception_table, store)?;

    // chain info per try: (end of try body, start of its last handler)
    let try_chains: Vec<(usize, usize)> = collect_try_chains(&disasm);

    for (index, insn) in insns.iter().enumerate() {
        match &insn.op {
            Opcode::If { cond, offset } => {
                register_branch(&mut disasm, index, *offset, IfConditionKind::CmpZero(compare_kind(*cond)))?;
            }
            Opcode::IfICmp { cond, offset } => {
                register_branch(&mut disasm, index, *offset, IfConditionKind::ICmp(compare_kind(*cond)))?;
            }
            Opcode::IfACmp { equal, offset } => {
                let kind = if *equal { CompareKind::Equals } else { CompareKind::NotEquals };
                register_branch(&mut disasm, index, *offset, IfConditionKind::ACmp(kind))?;
            }
            Opcode::IfNull { offset } => {
                register_branch(&mut disasm, index, *offset, IfConditionKind::Null(CompareKind::Equals))?;
            }
            Opcode::IfNonNull { offset } => {
                register_branch(&mut disasm, index, *offset, IfConditionKind::Null(CompareKind::NotEquals))?;
            }
            Opcode::Goto { offset } => register_goto(&mut disasm, &try_chains, index, *offset)?,
            Opcode::TableSwitch {
                default_offset,
                low,
                offsets,
            } => {
                let default_index = disasm.target_index(index, *default_offset)?;
                let mut cases = IndexMap::new();
                for (i, case_offset) in offsets.iter().enumerate() {
                    let value = low + i32::try_from(i).map_err(|_| DecompError::internal("switch table too large"))?;
                    cases.insert(value, disasm.target_index(index, *case_offset)?);
                }
                register_switch(&mut disasm, index, default_index, cases);
            }
            Opcode::LookupSwitch { default_offset, pairs } => {
                let default_index = disasm.target_index(index, *default_offset)?;
                let mut cases = IndexMap::new();
                for (value, case_offset) in pairs {
                    cases.insert(*value, disasm.target_index(index, *case_offset)?);
                }
                register_switch(&mut disasm, index, default_index, cases);
            }
            _ => {}
        }
    }

    disasm
        .blocks
        .sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)).then(a.rank().cmp(&b.rank())));

    Ok(disasm)
}

/// Erects `try` and `catch` blocks from the exception table. Entries
/// sharing a protected range belong to one `try`; entries sharing a
/// handler coalesce into one multi-catch.
fn register_exception_blocks(
    disasm: &mut Disassembly,
    exception_table: &[ExceptionEntry],
    store: &mut TypeStore,
) -> DecompResult<()> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for entry in exception_table {
        let range = (entry.start_pos, entry.end_pos);
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }

    for (start_pos, end_pos) in ranges {
        let try_start = disasm.pos_to_index(i64::from(start_pos))?;
        let try_end = disasm.pos_to_index(i64::from(end_pos))?;
        disasm.blocks.push(Block::new(BlockKind::Try, try_start, try_end));

        // handler position -> union of caught types, in table order
        let mut handlers: IndexMap<usize, Vec<Type>> = IndexMap::new();
        for entry in exception_table {
            if (entry.start_pos, entry.end_pos) != (start_pos, end_pos) {
                continue;
            }
            let handler = disasm.pos_to_index(i64::from(entry.handler_pos))?;
            let ty = match &entry.catch_type {
                Some(name) => Type::Class(store.intern_class(name)?),
                None => store.throwable(),
            };
            let types = handlers.entry(handler).or_default();
            if !types.contains(&ty) {
                types.push(ty);
            }
        }

        let starts: Vec<usize> = handlers.keys().copied().collect();
        let count = starts.len();
        for (i, (handler_start, types)) in handlers.into_iter().enumerate() {
            // the last handler's end is pinned once the try body's exit
            // jump is seen; until then it reaches the method end
            let end = starts.get(i + 1).copied().unwrap_or(disasm.code_len);
            disasm.blocks.push(Block::new(
                BlockKind::Catch {
                    types,
                    has_next: i + 1 < count,
                },
                handler_start,
                end,
            ));
        }
    }
    Ok(())
}

fn collect_try_chains(disasm: &Disassembly) -> Vec<(usize, usize)> {
    let mut chains = Vec::new();
    for block in &disasm.blocks {
        if !matches!(block.kind, BlockKind::Try) {
            continue;
        }
        let last_handler = disasm
            .blocks
            .iter()
            .filter(|b| matches!(b.kind, BlockKind::Catch { .. }) && b.start >= block.end)
            .map(|b| b.start)
            .max();
        if let Some(last) = last_handler {
            chains.push((block.end, last));
        }
    }
    chains
}

fn register_branch(disasm: &mut Disassembly, index: usize, offset: i32, condition: IfConditionKind) -> DecompResult<()> {
    let target = disasm.target_index(index, offset)?;
    if target > index {
        disasm
            .blocks
            .push(Block::new(BlockKind::If { condition, else_end: None }, index, target));
    } else {
        // backward conditional branch: the bottom of a do-style loop;
        // the branch itself becomes a conditional continue
        extend_or_create_loop(disasm, target, index);
    }
    Ok(())
}

fn register_switch(disasm: &mut Disassembly, index: usize, default_index: usize, cases: IndexMap<i32, usize>) {
    let end = cases
        .values()
        .copied()
        .chain(std::iter::once(default_index))
        .max()
        .unwrap_or(default_index);
    disasm.blocks.push(Block::new(
        BlockKind::Switch {
            default_index,
            cases,
            end_fixed: false,
        },
        index,
        end,
    ));
}

fn extend_or_create_loop(disasm: &mut Disassembly, start: usize, branch_index: usize) {
    let end = branch_index + 1;
    for block in &mut disasm.blocks {
        if matches!(block.kind, BlockKind::Loop) && block.start == start {
            block.end = block.end.max(end);
            return;
        }
    }
    disasm.blocks.push(Block::new(BlockKind::Loop, start, end));
}

fn register_goto(disasm: &mut Disassembly, try_chains: &[(usize, usize)], index: usize, offset: i32) -> DecompResult<()> {
    let target = disasm.target_index(index, offset)?;

    if target <= index {
        extend_or_create_loop(disasm, target, index);
        return Ok(());
    }

    // exit jump of a try body: pins the end of the handler chain; the
    // jump sits as the last protected instruction or just after the range
    for &(try_end, last_handler_start) in try_chains {
        if index + 1 == try_end || index == try_end {
            for block in &mut disasm.blocks {
                if matches!(block.kind, BlockKind::Catch { .. }) && block.start == last_handler_start && target > block.start {
                    block.end = target;
                }
            }
            disasm.consumed_gotos.insert(index);
            return Ok(());
        }
    }

    // exit jump of a non-last catch body
    let ends_catch = disasm
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Catch { has_next: true, .. }) && b.end == index + 1);
    if ends_catch {
        disasm.consumed_gotos.insert(index);
        return Ok(());
    }

    // a jump to the end of an enclosing loop or switch is a break;
    // leave it for the decompilation pass
    let breaks_out = disasm.blocks.iter().any(|b| {
        b.contains(index) && b.end == target && matches!(b.kind, BlockKind::Loop | BlockKind::Switch { .. })
    });
    if breaks_out {
        return Ok(());
    }

    // the first jump past a switch's computed end pins the real end
    if let Some(i) = disasm.innermost_containing(index, |b| matches!(b.kind, BlockKind::Switch { end_fixed: false, .. })) {
        let block = &mut disasm.blocks[i];
        if target >= block.end {
            block.end = target;
            if let BlockKind::Switch { end_fixed, .. } = &mut block.kind {
                *end_fixed = true;
            }
            return Ok(());
        }
    }

    // a jump terminating a conditional body attaches the else region
    let else_candidate = disasm
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b.kind, BlockKind::If { .. }) && b.end == index + 1 && b.start <= index)
        .min_by_key(|(_, b)| b.start)
        .map(|(i, _)| i);
    if let Some(i) = else_candidate {
        if let BlockKind::If { else_end, .. } = &mut disasm.blocks[i].kind {
            if else_end.is_none() {
                *else_end = Some(target);
                disasm.consumed_gotos.insert(index);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::ValueKind;

    fn insn(pos: u32, op: Opcode) -> Instruction {
        Instruction::new(pos, op)
    }

    /// `iload 0; ifeq +6; iconst_0; goto +4; iconst_1; istore 1`
    fn if_else_stream() -> Vec<Instruction> {
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::If { cond: IfCond::Eq, offset: 6 }),
            insn(4, Opcode::IConst(0)),
            insn(5, Opcode::Goto { offset: 4 }),
            insn(7, Opcode::IConst(1)),
            insn(9, Opcode::Store { kind: ValueKind::Int, slot: 1 }),
        ]
    }

    #[test]
    fn test_if_with_else_attachment() {
        let mut store = TypeStore::new();
        let disasm = disassemble(&if_else_stream(), &[], &mut store).unwrap();
        assert_eq!(disasm.blocks.len(), 1);
        let block = &disasm.blocks[0];
        assert_eq!((block.start, block.end), (1, 4));
        assert!(matches!(block.kind, BlockKind::If { else_end: Some(5), .. }));
        assert!(disasm.consumed_gotos.contains(&3));
    }

    #[test]
    fn test_backward_goto_creates_loop() {
        let mut store = TypeStore::new();
        let insns = vec![
            insn(0, Opcode::IConst(0)),
            insn(1, Opcode::Nop),
            insn(2, Opcode::Goto { offset: -1 }),
        ];
        let disasm = disassemble(&insns, &[], &mut store).unwrap();
        assert_eq!(disasm.blocks.len(), 1);
        assert!(matches!(disasm.blocks[0].kind, BlockKind::Loop));
        assert_eq!((disasm.blocks[0].start, disasm.blocks[0].end), (1, 3));
    }

    #[test]
    fn test_branch_out_of_range_is_fatal() {
        let mut store = TypeStore::new();
        let insns = vec![insn(0, Opcode::Goto { offset: 1 }), insn(2, Opcode::Nop)];
        // offset 1 lands inside the goto's own encoding
        assert!(matches!(
            disassemble(&insns, &[], &mut store),
            Err(DecompError::BranchOutOfRange { .. })
        ));
    }

    #[test]
    fn test_exception_table_coalesces_multi_catch() {
        let mut store = TypeStore::new();
        let insns: Vec<Instruction> = (0..6).map(|i| insn(i, Opcode::Nop)).collect();
        let table = vec![
            ExceptionEntry {
                start_pos: 0,
                end_pos: 2,
                handler_pos: 4,
                catch_type: Some("java/lang/IllegalStateException".to_owned()),
            },
            ExceptionEntry {
                start_pos: 0,
                end_pos: 2,
                handler_pos: 4,
                catch_type: Some("java/lang/IllegalArgumentException".to_owned()),
            },
        ];
        let disasm = disassemble(&insns, &table, &mut store).unwrap();
        let catch = disasm
            .blocks
            .iter()
            .find(|b| matches!(b.kind, BlockKind::Catch { .. }))
            .unwrap();
        let BlockKind::Catch { types, has_next } = &catch.kind else {
            unreachable!()
        };
        assert_eq!(types.len(), 2);
        assert!(!has_next);
        assert_eq!(catch.start, 4);
    }

    #[test]
    fn test_blocks_sorted_outermost_first() {
        let mut store = TypeStore::new();
        // while loop shape: 0: iload, 1: if_icmpge +9 (exit), 4: nop, 5: goto -5
        let insns = vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::IfICmp { cond: IfCond::Ge, offset: 9 }),
            insn(4, Opcode::Nop),
            insn(5, Opcode::Goto { offset: -5 }),
            insn(10, Opcode::Return(None)),
        ];
        let disasm = disassemble(&insns, &[], &mut store).unwrap();
        assert_eq!(disasm.blocks.len(), 2);
        assert!(matches!(disasm.blocks[0].kind, BlockKind::Loop));
        assert!(matches!(disasm.blocks[1].kind, BlockKind::If { .. }));
        assert_eq!(disasm.blocks[0].start, 0);
        assert_eq!(disasm.blocks[0].end, 4);
        assert_eq!(disasm.blocks[1].end, 4);
    }

    #[test]
    fn test_switch_offsets_translate_to_indices() {
        let mut store = TypeStore::new();
        let insns = vec![
            insn(0, Opcode::IConst(1)),
            insn(
                1,
                Opcode::LookupSwitch {
                    default_offset: 9,
                    pairs: vec![(1, 4), (2, 6)],
                },
            ),
            insn(5, Opcode::Nop),
            insn(7, Opcode::Nop),
            insn(10, Opcode::Return(None)),
        ];
        let disasm = disassemble(&insns, &[], &mut store).unwrap();
        let BlockKind::Switch { default_index, cases, .. } = &disasm.blocks[0].kind else {
            panic!("expected switch block")
        };
        assert_eq!(*default_index, 4);
        assert_eq!(cases.get(&1), Some(&2));
        assert_eq!(cases.get(&2), Some(&3));
        assert_eq!(disasm.blocks[0].end, 4);
    }
}
