mod common;

use cadenza_codegen::{
    lower::{guard_helper_effects, GuardHelperConfig},
    optim::{run_local_cse, run_specialize_select},
};
use cadenza_ir::{
    builder::test_util::func_builder,
    inst::{AccessFlags, AluOp, AtomicOp, InstData, Intrinsic},
    ControlFlowGraph, DomTree, Function, Metadata, Payload, Type,
};
use common::assert_verified;

/// A diamond whose merge block selects between a float and a constant.
fn diamond() -> Function {
    let mut builder = func_builder(&[Type::I1, Type::I32, Type::I32]);
    let [b0, b1, b2, b3] = [(); 4].map(|_| builder.append_block());
    let (cond, addr, data) = (builder.arg(0), builder.arg(1), builder.arg(2));

    builder.switch_to_block(b0);
    let coord = builder.intrinsic(Intrinsic::FragCoord, &[], Payload::None, Type::F32);
    builder.br(cond, b1, b2);

    builder.switch_to_block(b1);
    builder.insert_value(
        InstData::intrinsic(
            Intrinsic::GlobalAtomic,
            &[addr, data],
            Payload::Atomic {
                op: AtomicOp::Or,
                access: AccessFlags::empty(),
            },
        ),
        Type::I32,
    );
    builder.jump(b3);

    builder.switch_to_block(b2);
    builder.jump(b3);

    builder.switch_to_block(b3);
    let one = builder.imm(1.0f32);
    let sel = builder.alu(AluOp::Bcsel, &[cond, coord, one], Type::F32);
    builder.ret(&[sel]);
    builder.finish()
}

fn fresh_domtree(func: &Function) -> DomTree {
    let mut cfg = ControlFlowGraph::new();
    cfg.compute(func);
    let mut domtree = DomTree::new();
    domtree.compute(&cfg);
    domtree
}

#[test]
fn source_rewrites_keep_dominance() {
    let mut func = diamond();
    func.require(Metadata::all());
    let before = func.metadata().domtree().clone();

    assert!(run_specialize_select(&mut func));
    assert!(func.metadata().is_valid(Metadata::CONTROL_FLOW));
    assert_eq!(func.metadata().domtree(), &before);
    assert_eq!(fresh_domtree(&func), before);

    // The verifier compares the cached analyses against fresh ones.
    assert_verified(&func);
}

#[test]
fn control_flow_rewrites_drop_dominance() {
    let mut func = diamond();
    func.require(Metadata::all());
    let before = func.metadata().domtree().clone();

    assert!(guard_helper_effects(&mut func, GuardHelperConfig::default()));
    assert_eq!(func.metadata().valid(), Metadata::NONE);

    let after = func.require(Metadata::DOMINANCE).domtree().clone();
    assert_ne!(after, before);
    assert_eq!(after, fresh_domtree(&func));
    cadenza_verifier::debug_verify_func!(&func);
}

#[test]
fn unpreserved_kinds_are_dropped_without_change() {
    let mut func = diamond();
    func.require(Metadata::all());

    assert!(!run_local_cse(&mut func));
    assert!(func.metadata().is_valid(Metadata::CONTROL_FLOW));

    let mut func = diamond();
    func.require(Metadata::all());
    let config = GuardHelperConfig::default();
    assert!(guard_helper_effects(&mut func, config));
    func.require(Metadata::all());
    assert!(!guard_helper_effects(&mut func, config));
    assert_eq!(func.metadata().valid(), Metadata::NONE);
}
