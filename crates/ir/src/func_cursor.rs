//! Cursor based instruction insertion.
//!
//! A cursor is an explicit position value threaded through passes. Inserting
//! at a cursor only relinks the neighbors of the new instruction, so other
//! positions held by the caller stay valid.
use smallvec::SmallVec;

use crate::{
    inst::{AluOp, InstData, Intrinsic, Payload, Src},
    BlockId, Function, InstId, Type, ValueId,
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorLocation {
    /// New instructions go immediately before the instruction; the cursor
    /// stays in front of it so consecutive insertions keep their order.
    Before(InstId),
    /// New instructions go immediately after the instruction; the cursor
    /// then moves past the inserted instruction.
    After(InstId),
    BlockTop(BlockId),
    BlockBottom(BlockId),
    #[default]
    NoWhere,
}

pub trait FuncCursor {
    fn at_location(loc: CursorLocation) -> Self;
    fn set_location(&mut self, loc: CursorLocation);
    fn loc(&self) -> CursorLocation;

    fn position_before(&mut self, inst: InstId) {
        self.set_location(CursorLocation::Before(inst));
    }

    fn position_after(&mut self, inst: InstId) {
        self.set_location(CursorLocation::After(inst));
    }

    fn position_at_top(&mut self, block: BlockId) {
        self.set_location(CursorLocation::BlockTop(block));
    }

    fn position_at_bottom(&mut self, block: BlockId) {
        self.set_location(CursorLocation::BlockBottom(block));
    }

    /// Links an existing, detached instruction at the cursor.
    fn insert_inst(&mut self, func: &mut Function, inst: InstId) {
        match self.loc() {
            CursorLocation::Before(before) => func.layout.insert_inst_before(inst, before),
            CursorLocation::After(after) => {
                func.layout.insert_inst_after(inst, after);
                self.set_location(CursorLocation::After(inst));
            }
            CursorLocation::BlockTop(block) => {
                func.layout.prepend_inst(inst, block);
                self.set_location(CursorLocation::After(inst));
            }
            CursorLocation::BlockBottom(block) => func.layout.append_inst(inst, block),
            CursorLocation::NoWhere => panic!("cursor loc points to `NoWhere`"),
        }
    }

    /// Creates an instruction with one destination per entry of `dest_tys`
    /// and links it at the cursor.
    ///
    /// # Panics
    /// Panics if the source count does not satisfy the opcode's arity, or the
    /// destination count differs from the opcode's.
    fn emit(&mut self, func: &mut Function, data: InstData, dest_tys: &[Type]) -> InstId {
        let desc = data.desc();
        assert!(
            desc.arity.accepts(data.srcs.len()),
            "`{}` requires {}{} sources, {} given",
            desc.name,
            if desc.arity.is_variable() { "at least " } else { "" },
            desc.arity.min(),
            data.srcs.len()
        );

        let inst = func.dfg.make_inst(data);
        func.dfg.make_results(inst, dest_tys);
        self.insert_inst(func, inst);
        inst
    }

    /// Emits a single-destination instruction and returns its value.
    fn emit_value(&mut self, func: &mut Function, data: InstData, ty: Type) -> ValueId {
        let inst = self.emit(func, data, &[ty]);
        func.dfg.inst_results(inst)[0]
    }

    /// Emits an instruction without destinations.
    fn emit_effect(&mut self, func: &mut Function, data: InstData) -> InstId {
        self.emit(func, data, &[])
    }

    fn alu(&mut self, func: &mut Function, op: AluOp, args: &[ValueId], ty: Type) -> ValueId {
        self.emit_value(func, InstData::alu(op, args), ty)
    }

    fn alu_srcs(&mut self, func: &mut Function, op: AluOp, srcs: &[Src], ty: Type) -> ValueId {
        self.emit_value(func, InstData::new(op, srcs), ty)
    }

    fn intrinsic(
        &mut self,
        func: &mut Function,
        intr: Intrinsic,
        args: &[ValueId],
        payload: Payload,
        ty: Type,
    ) -> ValueId {
        self.emit_value(func, InstData::intrinsic(intr, args, payload), ty)
    }

    fn undef(&mut self, func: &mut Function, ty: Type) -> ValueId {
        self.alu(func, AluOp::Undef, &[], ty)
    }

    /// Unlinks `inst` and drops it from its sources' use lists.
    ///
    /// A cursor positioned at `inst` moves to the following position.
    ///
    /// # Panics
    /// Panics if a destination of `inst` is still read.
    fn remove_inst(&mut self, func: &mut Function, inst: InstId) {
        assert!(
            !func.dfg.has_live_results(inst),
            "`{inst}` is removed while its results are still used"
        );

        match self.loc() {
            CursorLocation::Before(at) | CursorLocation::After(at) if at == inst => {
                let next = match func.layout.next_inst_of(inst) {
                    Some(next) => CursorLocation::Before(next),
                    None => CursorLocation::BlockBottom(func.layout.inst_block(inst)),
                };
                self.set_location(next);
            }
            _ => {}
        }

        func.dfg.untrack_inst(inst);
        func.layout.remove_inst(inst);
    }

    /// Detaches `inst` from its block without touching its data or use lists,
    /// so that it can be re-inserted elsewhere.
    fn unlink_inst(&mut self, func: &mut Function, inst: InstId) {
        debug_assert!(!matches!(
            self.loc(),
            CursorLocation::Before(at) | CursorLocation::After(at) if at == inst
        ));
        func.layout.remove_inst(inst);
    }

    fn make_block(&mut self, func: &mut Function) -> BlockId {
        func.dfg.make_block()
    }

    /// Inserts `block` into the layout after the current block.
    fn insert_block(&mut self, func: &mut Function, block: BlockId) {
        let current = self.expect_block(func);
        func.layout.insert_block_after(block, current);
    }

    fn append_block(&mut self, func: &mut Function, block: BlockId) {
        func.layout.append_block(block);
    }

    /// Moves the cursor's instruction and everything after it into a new
    /// block placed after the current one, and returns the new block.
    ///
    /// The original block is left without a terminator; successor phis still
    /// name it as their incoming block.
    fn split_block(&mut self, func: &mut Function) -> BlockId {
        let inst = match self.loc() {
            CursorLocation::Before(inst) => inst,
            loc => panic!("split requires a cursor before an instruction, got {loc:?}"),
        };
        let block = func.layout.inst_block(inst);
        let tail = func.dfg.make_block();
        func.layout.insert_block_after(tail, block);
        func.layout.split_block_at(inst, tail);
        self.set_location(CursorLocation::BlockBottom(block));
        tail
    }

    fn block(&self, func: &Function) -> Option<BlockId> {
        match self.loc() {
            CursorLocation::Before(inst) | CursorLocation::After(inst) => {
                Some(func.layout.inst_block(inst))
            }
            CursorLocation::BlockTop(block) | CursorLocation::BlockBottom(block) => Some(block),
            CursorLocation::NoWhere => None,
        }
    }

    fn expect_block(&self, func: &Function) -> BlockId {
        self.block(func).expect("cursor loc points to `NoWhere`")
    }

    /// Returns the instructions of the cursor's block that follow the cursor.
    fn following_insts(&self, func: &Function) -> SmallVec<[InstId; 8]> {
        let mut next = match self.loc() {
            CursorLocation::Before(inst) => Some(inst),
            CursorLocation::After(inst) => func.layout.next_inst_of(inst),
            CursorLocation::BlockTop(block) => func.layout.first_inst_of(block),
            CursorLocation::BlockBottom(_) | CursorLocation::NoWhere => None,
        };

        let mut insts = SmallVec::new();
        while let Some(inst) = next {
            insts.push(inst);
            next = func.layout.next_inst_of(inst);
        }
        insts
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InstInserter {
    loc: CursorLocation,
}

impl FuncCursor for InstInserter {
    fn at_location(loc: CursorLocation) -> Self {
        Self { loc }
    }

    fn set_location(&mut self, loc: CursorLocation) {
        self.loc = loc;
    }

    fn loc(&self) -> CursorLocation {
        self.loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_util::{dump_func, func_builder};

    #[test]
    fn insert_before_keeps_program_order() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let prod = builder.alu(AluOp::Fmul, &[a, b], Type::F32);
        builder.ret(&[prod]);
        let mut func = builder.finish();

        let mul = func.dfg.value_inst(prod).unwrap();
        let mut cursor = InstInserter::at_location(CursorLocation::Before(mul));
        let sum = cursor.alu(&mut func, AluOp::Fadd, &[a, b], Type::F32);
        cursor.alu(&mut func, AluOp::Fsub, &[sum, b], Type::F32);
        assert_eq!(cursor.loc(), CursorLocation::Before(mul));

        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.f32, v1.f32) {
    block0:
        v3.f32 = fadd v0 v1;
        v4.f32 = fsub v3 v1;
        v2.f32 = fmul v0 v1;
        return v2;
}
"
        );
    }

    #[test]
    fn insert_at_block_top_advances() {
        let mut builder = func_builder(&[Type::I32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        builder.ret(&[]);
        let mut func = builder.finish();

        let a = func.arg_values[0];
        let mut cursor = InstInserter::at_location(CursorLocation::BlockTop(b0));
        let x = cursor.alu(&mut func, AluOp::Iadd, &[a, a], Type::I32);
        let y = cursor.alu(&mut func, AluOp::Imul, &[x, a], Type::I32);

        let insts: Vec<_> = func.layout.iter_inst(b0).collect();
        assert_eq!(insts[0], func.dfg.value_inst(x).unwrap());
        assert_eq!(insts[1], func.dfg.value_inst(y).unwrap());
        assert_eq!(insts.len(), 3);
    }

    #[test]
    #[should_panic(expected = "requires 2 sources")]
    fn emit_with_missing_source() {
        let mut builder = func_builder(&[Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        builder.alu(AluOp::Fadd, &[a], Type::F32);
    }

    #[test]
    #[should_panic(expected = "still used")]
    fn remove_used_inst() {
        let mut builder = func_builder(&[Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        let neg = builder.alu(AluOp::Fneg, &[a], Type::F32);
        builder.ret(&[neg]);
        let mut func = builder.finish();

        let inst = func.dfg.value_inst(neg).unwrap();
        InstInserter::default().remove_inst(&mut func, inst);
    }

    #[test]
    fn remove_advances_cursor() {
        let mut builder = func_builder(&[Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        let neg = builder.alu(AluOp::Fneg, &[a], Type::F32);
        builder.ret(&[]);
        let mut func = builder.finish();

        let inst = func.dfg.value_inst(neg).unwrap();
        let ret = func.layout.last_inst_of(b0).unwrap();
        let mut cursor = InstInserter::at_location(CursorLocation::Before(inst));
        cursor.remove_inst(&mut func, inst);
        assert_eq!(cursor.loc(), CursorLocation::Before(ret));
        assert_eq!(func.dfg.users_num(a), 0);
        assert!(!func.layout.is_inst_inserted(inst));
    }

    #[test]
    fn split_block_moves_tail() {
        let mut builder = func_builder(&[Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        let neg = builder.alu(AluOp::Fneg, &[a], Type::F32);
        builder.ret(&[neg]);
        let mut func = builder.finish();

        let inst = func.dfg.value_inst(neg).unwrap();
        let mut cursor = InstInserter::at_location(CursorLocation::Before(inst));
        let tail = cursor.split_block(&mut func);

        assert!(func.layout.is_block_empty(b0));
        assert_eq!(func.layout.next_block_of(b0), Some(tail));
        assert_eq!(func.layout.inst_block(inst), tail);
        assert_eq!(cursor.loc(), CursorLocation::BlockBottom(b0));
    }
}
