//! Dead code elimination.
//!
//! Removes instructions without side effects whose destinations are no
//! longer read. Removing one instruction can make the definitions of its
//! sources dead, so those are revisited until nothing changes.
use cadenza_ir::{metadata::Metadata, FuncCursor, Function, InstId, InstInserter};
use smallvec::SmallVec;

pub fn run_dce(func: &mut Function) -> bool {
    let _span = tracing::debug_span!("dce", func = %func.name).entered();
    let changed = DceSolver::new().run(func);
    tracing::debug!(changed);
    changed
}

#[derive(Default)]
pub struct DceSolver {
    worklist: Vec<InstId>,
}

impl DceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.worklist.clear();
    }

    pub fn run(&mut self, func: &mut Function) -> bool {
        self.clear();
        for block in func.layout.iter_block() {
            for inst in func.layout.iter_inst(block) {
                if is_dead(func, inst) {
                    self.worklist.push(inst);
                }
            }
        }

        let mut changed = false;
        let mut cursor = InstInserter::default();
        while let Some(inst) = self.worklist.pop() {
            if !func.layout.is_inst_inserted(inst) || !is_dead(func, inst) {
                continue;
            }

            let defs: SmallVec<[InstId; 4]> = func
                .dfg
                .inst(inst)
                .srcs
                .iter()
                .filter_map(|src| func.dfg.value_inst(src.value))
                .collect();

            tracing::trace!(%inst, "removed");
            cursor.remove_inst(func, inst);
            changed = true;

            self.worklist
                .extend(defs.into_iter().filter(|&def| def != inst));
        }

        if changed {
            func.preserve_only(Metadata::CONTROL_FLOW);
        }
        changed
    }
}

fn is_dead(func: &Function, inst: InstId) -> bool {
    func.dfg.inst(inst).can_eliminate() && !func.dfg.has_live_results(inst)
}

#[cfg(test)]
mod tests {
    use cadenza_ir::{
        builder::test_util::{dump_func, func_builder},
        inst::{AluOp, Intrinsic, Payload},
        Type,
    };

    use super::*;

    #[test]
    fn removes_dead_chains() {
        let mut builder = func_builder(&[Type::F32, Type::I32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (a, addr) = (builder.arg(0), builder.arg(1));
        let x = builder.alu(AluOp::Fadd, &[a, a], Type::F32);
        let y = builder.alu(AluOp::Fneg, &[x], Type::F32);
        builder.alu(AluOp::Fmul, &[y, a], Type::F32);
        builder.intrinsic(Intrinsic::Load, &[addr], Payload::None, Type::I32);
        builder.insert_effect(cadenza_ir::InstData::intrinsic(
            Intrinsic::Store,
            &[addr, addr],
            Payload::None,
        ));
        builder.ret(&[]);
        let mut func = builder.finish();

        assert!(run_dce(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.f32, v1.i32) {
    block0:
        store v1 v1;
        return;
}
"
        );
        assert!(!run_dce(&mut func));
    }

    #[test]
    fn live_values_survive() {
        let mut builder = func_builder(&[Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let a = builder.arg(0);
        let x = builder.alu(AluOp::Fabs, &[a], Type::F32);
        builder.ret(&[x]);
        let mut func = builder.finish();
        func.require(Metadata::all());

        assert!(!run_dce(&mut func));
        assert!(func.metadata().is_valid(Metadata::all()));
    }
}
