//! Block-local common subexpression elimination.
//!
//! Within one block, instructions with the same opcode, payload, canonical
//! sources and destination types are merged into the first occurrence.
//! Sources are rewritten through the replacement map before an instruction
//! is probed, so merges compose within a single forward walk. Nothing is
//! shared across blocks.
use cadenza_ir::{
    inst::Payload, metadata::Metadata, BlockId, FuncCursor, Function, InstId, InstInserter,
    Opcode, Src, Type, ValueId,
};
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::pass::{apply, InstPass};

/// Runs local CSE on `func`. Returns `true` if anything changed.
pub fn run_local_cse(func: &mut Function) -> bool {
    let _span = tracing::debug_span!("local_cse", func = %func.name).entered();
    let changed = apply(func, &mut LocalCse::new(), Metadata::CONTROL_FLOW);
    tracing::debug!(changed);
    changed
}

/// Destination identity is not part of the key, only the types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CseKey {
    opcode: Opcode,
    payload: Payload,
    srcs: SmallVec<[Src; 4]>,
    dest_tys: SmallVec<[Type; 2]>,
}

impl CseKey {
    fn of(func: &Function, inst: InstId) -> Self {
        let data = func.dfg.inst(inst);
        Self {
            opcode: data.opcode,
            payload: data.payload,
            srcs: data.srcs.clone(),
            dest_tys: func
                .dfg
                .inst_results(inst)
                .iter()
                .map(|&value| func.dfg.value_ty(value))
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct LocalCse {
    table: FxHashMap<CseKey, InstId>,
    replacement: FxHashMap<ValueId, ValueId>,
    duplicates: IndexSet<InstId>,
}

impl LocalCse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.replacement.clear();
        self.duplicates.clear();
    }

    /// Rewrites the sources of `inst` through the replacement map.
    fn canonicalize_srcs(&mut self, func: &mut Function, inst: InstId) -> bool {
        let mut changed = false;
        for idx in 0..func.dfg.inst(inst).srcs.len() {
            let src = func.dfg.inst(inst).src(idx);
            if let Some(&to) = self.replacement.get(&src.value) {
                func.dfg.rewrite_src(inst, idx, src.redirect(to));
                changed = true;
            }
        }
        changed
    }
}

impl InstPass for LocalCse {
    fn enter_block(&mut self, _func: &mut Function, _block: BlockId) {
        self.clear();
    }

    fn visit_inst(
        &mut self,
        _cursor: &mut InstInserter,
        func: &mut Function,
        inst: InstId,
    ) -> bool {
        let mut changed = self.canonicalize_srcs(func, inst);

        let data = func.dfg.inst(inst);
        if !(data.can_eliminate() && data.can_reorder()) {
            return changed;
        }

        let key = CseKey::of(func, inst);
        match self.table.get(&key) {
            Some(&repr) => {
                tracing::trace!(%inst, %repr, "merged");
                let dests = func.dfg.inst_results(inst);
                let repr_dests = func.dfg.inst_results(repr);
                for (&dest, &repr_dest) in dests.iter().zip(repr_dests) {
                    self.replacement.insert(dest, repr_dest);
                }
                self.duplicates.insert(inst);
                changed = true;
            }
            None => {
                self.table.insert(key, inst);
            }
        }

        changed
    }

    /// Redirects uses of merged destinations outside the block and removes
    /// the duplicates.
    fn leave_block(&mut self, func: &mut Function, _block: BlockId) -> bool {
        for (&from, &to) in &self.replacement {
            func.dfg.replace_all_uses(from, to);
        }

        let mut cursor = InstInserter::default();
        for &inst in &self.duplicates {
            cursor.remove_inst(func, inst);
        }

        !self.duplicates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use cadenza_ir::{
        builder::test_util::{dump_func, func_builder},
        inst::{AluOp, Intrinsic},
        SrcMod,
    };

    use super::*;

    #[test]
    fn merges_identical_fadds() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let v1 = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let v2 = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let v3 = builder.alu(AluOp::Fmul, &[v1, v2], Type::F32);
        builder.ret(&[v3]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.f32, v1.f32) {
    block0:
        v2.f32 = fadd v0 v1;
        v4.f32 = fmul v2 v2;
        return v4;
}
"
        );

        let fmul = func.dfg.value_inst(v3).unwrap();
        assert_eq!(func.dfg.inst(fmul).src(1).value, v1);
        assert!(!run_local_cse(&mut func));
    }

    #[test]
    fn merges_compose_transitively() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let x1 = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let x2 = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let y1 = builder.alu(AluOp::Fneg, &[x1], Type::F32);
        let y2 = builder.alu(AluOp::Fneg, &[x2], Type::F32);
        let sum = builder.alu(AluOp::Fadd, &[y1, y2], Type::F32);
        builder.ret(&[sum]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.f32, v1.f32) {
    block0:
        v2.f32 = fadd v0 v1;
        v4.f32 = fneg v2;
        v6.f32 = fadd v4 v4;
        return v6;
}
"
        );
    }

    #[test]
    fn never_merges_across_blocks() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        let b1 = builder.append_block();
        let (a, b) = (builder.arg(0), builder.arg(1));

        builder.switch_to_block(b0);
        let x = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        builder.jump(b1);
        builder.switch_to_block(b1);
        let y = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let prod = builder.alu(AluOp::Fmul, &[x, y], Type::F32);
        builder.ret(&[prod]);
        let mut func = builder.finish();
        let before = dump_func(&func);

        assert!(!run_local_cse(&mut func));
        assert_eq!(dump_func(&func), before);
    }

    #[test]
    fn modifiers_distinguish_sources() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let neg_a = Src::with_mod(a, SrcMod::Neg);
        let x = builder.insert_value(
            cadenza_ir::InstData::new(AluOp::Fadd, &[neg_a, b.into()]),
            Type::F32,
        );
        let y = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let prod = builder.alu(AluOp::Fmul, &[x, y], Type::F32);
        builder.ret(&[prod]);
        let mut func = builder.finish();

        assert!(!run_local_cse(&mut func));
    }

    #[test]
    fn dest_types_take_part_in_key() {
        let mut builder = func_builder(&[Type::I64]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        let data = cadenza_ir::InstData::alu(AluOp::Split, &[a]);
        let s1 = builder.insert(data.clone(), &[Type::I32, Type::I32]);
        let s2 = builder.insert(data.clone(), &[Type::I32, Type::I32]);
        let s3 = builder.insert(data, &[Type::I32, Type::I16]);
        let mut vals = Vec::new();
        for inst in [s1, s2, s3] {
            vals.extend_from_slice(builder.func.dfg.inst_results(inst));
        }
        let vec = builder.alu(AluOp::Vec, &vals, Type::I32.vec(6));
        builder.ret(&[vec]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        assert!(func.layout.is_inst_inserted(s1));
        assert!(!func.layout.is_inst_inserted(s2));
        assert!(func.layout.is_inst_inserted(s3));

        let vec_inst = func.dfg.value_inst(vec).unwrap();
        let srcs: Vec<_> = func.dfg.inst(vec_inst).srcs.iter().map(|s| s.value).collect();
        assert_eq!(srcs[2..4], srcs[0..2]);
    }

    #[test]
    fn vectors_match_only_with_equal_source_counts() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let pair = builder.alu(AluOp::Vec, &[a, b], Type::F32.vec(2));
        let triple = builder.alu(AluOp::Vec, &[a, b, b], Type::F32.vec(3));
        builder.ret(&[pair, triple]);
        let mut func = builder.finish();
        let before = dump_func(&func);

        assert!(!run_local_cse(&mut func));
        assert_eq!(dump_func(&func), before);
    }

    #[test]
    fn identical_vectors_are_merged() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, b) = (builder.arg(0), builder.arg(1));
        let x = builder.alu(AluOp::Vec, &[a, b], Type::F32.vec(2));
        let y = builder.alu(AluOp::Vec, &[a, b], Type::F32.vec(2));
        let sum = builder.alu(AluOp::Fadd, &[x, y], Type::F32.vec(2));
        builder.ret(&[sum]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.f32, v1.f32) {
    block0:
        v2.f32x2 = vec v0 v1;
        v4.f32x2 = fadd v2 v2;
        return v4;
}
"
        );
    }

    #[test]
    fn side_effects_are_kept() {
        let mut builder = func_builder(&[Type::I32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let addr = builder.arg(0);
        let h1 = builder.intrinsic(Intrinsic::IsHelper, &[], Payload::None, Type::I1);
        let h2 = builder.intrinsic(Intrinsic::IsHelper, &[], Payload::None, Type::I1);
        let l1 = builder.intrinsic(Intrinsic::Load, &[addr], Payload::None, Type::I32);
        let l2 = builder.intrinsic(Intrinsic::Load, &[addr], Payload::None, Type::I32);
        builder.ret(&[h1, h2, l1, l2]);
        let mut func = builder.finish();

        assert!(!run_local_cse(&mut func));
    }

    #[test]
    fn reorderable_loads_are_merged() {
        use cadenza_ir::inst::AccessFlags;

        let mut builder = func_builder(&[Type::I32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let addr = builder.arg(0);
        let payload = Payload::Access(AccessFlags::CAN_REORDER);
        let l1 = builder.intrinsic(Intrinsic::Load, &[addr], payload, Type::I32);
        let l2 = builder.intrinsic(Intrinsic::Load, &[addr], payload, Type::I32);
        let sum = builder.alu(AluOp::Iadd, &[l1, l2], Type::I32);
        builder.ret(&[sum]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        assert!(func.dfg.value_inst(l2).map_or(false, |inst| !func.layout.is_inst_inserted(inst)));
    }

    #[test]
    fn uses_in_later_blocks_follow_the_merge() {
        let mut builder = func_builder(&[Type::F32, Type::F32]);
        let b0 = builder.append_block();
        let b1 = builder.append_block();
        let (a, b) = (builder.arg(0), builder.arg(1));

        builder.switch_to_block(b0);
        let x = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        let y = builder.alu(AluOp::Fadd, &[a, b], Type::F32);
        builder.jump(b1);
        builder.switch_to_block(b1);
        let prod = builder.alu(AluOp::Fmul, &[x, y], Type::F32);
        builder.ret(&[prod]);
        let mut func = builder.finish();

        assert!(run_local_cse(&mut func));
        let fmul = func.dfg.value_inst(prod).unwrap();
        assert_eq!(func.dfg.inst(fmul).src(1).value, x);
        assert_eq!(func.dfg.users_num(y), 0);
    }
}
