//! Guards memory side effects against helper invocations.
//!
//! A guarded instruction `x = op ..` in block `b` is rewritten into
//!
//! ```text
//! b:     h = is_helper; nh = inot h; br nh then else
//! then:  x = op ..; jump merge
//! else:  u = undef; jump merge
//! merge: x' = phi (x then) (u else); <rest of b>
//! ```
//!
//! and every use of `x` outside the guard reads `x'`. Instructions without
//! a destination get no `else` block and no phi.
use cadenza_ir::{
    inst::{AluOp, InstData, Intrinsic, Payload},
    metadata::Metadata,
    BlockId, FuncCursor, Function, InstId, InstInserter, Opcode, Type,
};

use crate::pass::apply_fn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardHelperConfig {
    /// Guard plain stores as well as atomics.
    pub guard_stores_too: bool,
}

pub fn guard_helper_effects(func: &mut Function, config: GuardHelperConfig) -> bool {
    let _span = tracing::debug_span!("guard_helper", func = %func.name).entered();

    let changed = apply_fn(
        func,
        |cursor, func, inst| {
            if !is_guardable(func, inst, config) || is_guarded(func, inst) {
                return false;
            }
            tracing::trace!(%inst, "guarded");
            guard_inst(cursor, func, inst);
            true
        },
        Metadata::NONE,
    );

    tracing::debug!(changed);
    changed
}

fn is_guardable(func: &Function, inst: InstId, config: GuardHelperConfig) -> bool {
    match func.dfg.inst(inst).opcode {
        Opcode::Intrinsic(Intrinsic::GlobalAtomic | Intrinsic::ImageAtomic) => true,
        Opcode::Intrinsic(Intrinsic::Store | Intrinsic::ImageStore) => config.guard_stores_too,
        _ => false,
    }
}

/// Returns `true` if `inst` already opens a block entered only when
/// `!is_helper` holds.
fn is_guarded(func: &Function, inst: InstId) -> bool {
    let block = func.layout.inst_block(inst);
    if func.layout.first_inst_of(block) != Some(inst) {
        return false;
    }
    let Some(term) = func
        .layout
        .prev_block_of(block)
        .and_then(|prev| func.layout.last_inst_of(prev))
    else {
        return false;
    };

    let term_data = func.dfg.inst(term);
    if term_data.opcode != Opcode::Br || term_data.blocks[0] != block {
        return false;
    }

    let defined_by = |value, expected: Opcode| -> Option<InstId> {
        let def = func.dfg.value_inst(value)?;
        (func.dfg.inst(def).opcode == expected).then_some(def)
    };
    defined_by(term_data.src(0).value, AluOp::Inot.into())
        .and_then(|not| defined_by(func.dfg.inst(not).src(0).value, Intrinsic::IsHelper.into()))
        .is_some()
}

fn guard_inst(cursor: &mut InstInserter, func: &mut Function, inst: InstId) {
    let dest = match func.dfg.inst_results(inst) {
        [] => None,
        [dest] => Some(*dest),
        _ => panic!("`{inst}` defines more than one value"),
    };

    let is_helper = cursor.intrinsic(func, Intrinsic::IsHelper, &[], Payload::None, Type::I1);
    let not_helper = cursor.alu(func, AluOp::Inot, &[is_helper], Type::I1);

    let block = cursor.expect_block(func);
    let merge = cursor.split_block(func);
    retarget_successor_phis(func, merge, block);

    let then_block = cursor.make_block(func);
    func.layout.insert_block_after(then_block, block);
    let else_block = dest.map(|_| {
        let else_block = cursor.make_block(func);
        func.layout.insert_block_after(else_block, then_block);
        else_block
    });

    cursor.position_at_bottom(block);
    cursor.emit_effect(
        func,
        InstData::br(not_helper, then_block, else_block.unwrap_or(merge)),
    );

    cursor.unlink_inst(func, inst);
    cursor.position_at_bottom(then_block);
    cursor.insert_inst(func, inst);
    cursor.emit_effect(func, InstData::jump(merge));

    if let (Some(dest), Some(else_block)) = (dest, else_block) {
        let ty = func.dfg.value_ty(dest);
        cursor.position_at_bottom(else_block);
        let undef = cursor.undef(func, ty);
        cursor.emit_effect(func, InstData::jump(merge));

        cursor.position_at_top(merge);
        let phi = cursor.emit(
            func,
            InstData::phi(&[(dest, then_block), (undef, else_block)]),
            &[ty],
        );
        let merged = func.dfg.inst_results(phi)[0];
        func.dfg.replace_uses_except(dest, merged, Some(phi));
    }
}

/// The terminator of `from` now lives in `merge`; phis in its successors
/// must name `merge` as the incoming block.
fn retarget_successor_phis(func: &mut Function, merge: BlockId, from: BlockId) {
    let Some(term) = func.layout.last_inst_of(merge) else {
        return;
    };
    let succs: Vec<BlockId> = func.dfg.inst(term).branch_dests().to_vec();
    for succ in succs {
        let phis: Vec<InstId> = func
            .layout
            .iter_inst(succ)
            .take_while(|&inst| func.dfg.inst(inst).is_phi())
            .collect();
        for phi in phis {
            func.dfg.rewrite_block_ref(phi, from, merge);
        }
    }
}

#[cfg(test)]
mod tests {
    use cadenza_ir::{
        builder::test_util::{dump_func, func_builder},
        inst::{AccessFlags, AtomicOp},
    };

    use super::*;

    fn atomic_then_store() -> Function {
        let mut builder = func_builder(&[Type::I32, Type::I32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (addr, data) = (builder.arg(0), builder.arg(1));
        let old = builder.insert_value(
            InstData::intrinsic(
                Intrinsic::GlobalAtomic,
                &[addr, data],
                Payload::Atomic {
                    op: AtomicOp::Add,
                    access: AccessFlags::empty(),
                },
            ),
            Type::I32,
        );
        builder.insert_effect(InstData::intrinsic(
            Intrinsic::Store,
            &[addr, old],
            Payload::None,
        ));
        builder.ret(&[old]);
        builder.finish()
    }

    #[test]
    fn atomic_result_is_merged() {
        let mut func = atomic_then_store();
        assert!(guard_helper_effects(&mut func, GuardHelperConfig::default()));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.i32, v1.i32) {
    block0:
        v3.i1 = is_helper;
        v4.i1 = inot v3;
        br v4 block2 block3;

    block2:
        v2.i32 = global_atomic v0 v1 [add];
        jump block1;

    block3:
        v5.i32 = undef;
        jump block1;

    block1:
        v6.i32 = phi (v2 block2) (v5 block3);
        store v0 v6;
        return v6;
}
"
        );
        assert!(!guard_helper_effects(&mut func, GuardHelperConfig::default()));
    }

    #[test]
    fn stores_are_guarded_on_request() {
        let mut func = atomic_then_store();
        let config = GuardHelperConfig {
            guard_stores_too: true,
        };
        assert!(guard_helper_effects(&mut func, config));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.i32, v1.i32) {
    block0:
        v3.i1 = is_helper;
        v4.i1 = inot v3;
        br v4 block2 block3;

    block2:
        v2.i32 = global_atomic v0 v1 [add];
        jump block1;

    block3:
        v5.i32 = undef;
        jump block1;

    block1:
        v6.i32 = phi (v2 block2) (v5 block3);
        v7.i1 = is_helper;
        v8.i1 = inot v7;
        br v8 block5 block4;

    block5:
        store v0 v6;
        jump block4;

    block4:
        return v6;
}
"
        );
        assert!(!guard_helper_effects(&mut func, config));
    }

    #[test]
    fn successor_phis_follow_the_split() {
        let mut builder = func_builder(&[Type::I32, Type::I32, Type::I1]);
        let b0 = builder.append_block();
        let b1 = builder.append_block();
        let b2 = builder.append_block();
        let (addr, data, cond) = (builder.arg(0), builder.arg(1), builder.arg(2));

        builder.switch_to_block(b0);
        builder.br(cond, b1, b2);

        builder.switch_to_block(b1);
        builder.insert_effect(InstData::intrinsic(
            Intrinsic::Store,
            &[addr, data],
            Payload::None,
        ));
        builder.jump(b2);

        builder.switch_to_block(b2);
        let joined = builder.phi(Type::I32, &[(addr, b0), (data, b1)]);
        builder.ret(&[joined]);
        let mut func = builder.finish();

        let config = GuardHelperConfig {
            guard_stores_too: true,
        };
        assert!(guard_helper_effects(&mut func, config));

        let phi = func.dfg.value_inst(joined).unwrap();
        let incoming: Vec<_> = func.dfg.inst(phi).phi_incoming().map(|(_, b)| b).collect();
        let merge = func.layout.prev_block_of(b2).unwrap();
        assert_eq!(incoming, [b0, merge]);
        assert_ne!(merge, b1);

        func.require(Metadata::DOMINANCE);
        let cfg = func.metadata().cfg();
        assert!(cfg.is_pred(merge, b2));
        assert!(!cfg.is_pred(b1, b2));
    }
}
