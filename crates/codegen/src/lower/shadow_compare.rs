//! Removes the depth comparator from shadow texture fetches.
//!
//! `tex image coord ref [cmp=f]` becomes a plain fetch followed by the
//! comparison of `ref` against the fetched depth and a `b2f`, yielding 1.0
//! when the comparison passes and 0.0 otherwise.
use cadenza_ir::{
    inst::{AluOp, CompareFunc, InstData, Intrinsic, Payload, TexPayload},
    metadata::Metadata,
    FuncCursor, Function, InstId, InstInserter, Src, Type, ValueId,
};
use smallvec::SmallVec;

use crate::pass::apply_fn;

pub fn lower_shadow_compare(func: &mut Function) -> bool {
    let _span = tracing::debug_span!("lower_shadow_compare", func = %func.name).entered();
    let changed = apply_fn(func, lower_inst, Metadata::CONTROL_FLOW);
    tracing::debug!(changed);
    changed
}

fn lower_inst(cursor: &mut InstInserter, func: &mut Function, inst: InstId) -> bool {
    let data = func.dfg.inst(inst);
    if !data.is_intrinsic(Intrinsic::Tex) {
        return false;
    }
    let (tex, compare) = match data.payload {
        Payload::Tex(tex @ TexPayload {
            compare: Some(compare),
            ..
        }) => (tex, compare),
        _ => return false,
    };
    assert!(
        data.srcs.len() >= 3,
        "shadow fetch `{inst}` has no reference value"
    );

    let reference = data.src(2).value;
    let mut fetch_srcs: SmallVec<[Src; 4]> = data.srcs.clone();
    fetch_srcs.remove(2);
    let old = func.dfg.inst_results(inst)[0];

    let result = match compare {
        CompareFunc::Always => func.dfg.make_imm_value(1.0f32),
        CompareFunc::Never => func.dfg.make_imm_value(0.0f32),
        _ => {
            let fetch = InstData::new(Intrinsic::Tex, &fetch_srcs).with_payload(Payload::Tex(
                TexPayload {
                    compare: None,
                    ..tex
                },
            ));
            let depth = cursor.emit_value(func, fetch, Type::F32);
            let passed = emit_compare(cursor, func, compare, reference, depth);
            cursor.alu(func, AluOp::B2f, &[passed], Type::F32)
        }
    };

    tracing::trace!(%inst, ?compare, "removed shadow comparator");
    func.dfg.replace_all_uses(old, result);
    cursor.remove_inst(func, inst);
    true
}

/// Emits `reference <compare> depth`.
fn emit_compare(
    cursor: &mut InstInserter,
    func: &mut Function,
    compare: CompareFunc,
    reference: ValueId,
    depth: ValueId,
) -> ValueId {
    let (op, lhs, rhs) = match compare {
        CompareFunc::Less => (AluOp::Flt, reference, depth),
        CompareFunc::GreaterEqual => (AluOp::Fge, reference, depth),
        CompareFunc::Greater => (AluOp::Flt, depth, reference),
        CompareFunc::LessEqual => (AluOp::Fge, depth, reference),
        CompareFunc::Equal => (AluOp::Feq, reference, depth),
        CompareFunc::NotEqual => (AluOp::Fne, reference, depth),
        CompareFunc::Always | CompareFunc::Never => {
            unreachable!("constant comparisons emit no compare")
        }
    };
    cursor.alu(func, op, &[lhs, rhs], Type::I1)
}

#[cfg(test)]
mod tests {
    use cadenza_ir::{
        builder::test_util::{dump_func, func_builder},
        ImageDim,
    };

    use super::*;

    fn shadow_fetch(compare: CompareFunc) -> Function {
        let mut builder = func_builder(&[Type::HANDLE, Type::F32.vec(2), Type::F32]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let (image, coord, reference) = (builder.arg(0), builder.arg(1), builder.arg(2));
        let payload = Payload::Tex(TexPayload {
            dim: ImageDim::Dim2D,
            arrayed: false,
            compare: Some(compare),
        });
        let srcs = [image, coord, reference];
        let lit = builder.intrinsic(Intrinsic::Tex, &srcs, payload, Type::F32);
        builder.ret(&[lit]);
        builder.finish()
    }

    #[test]
    fn less_equal_swaps_operands() {
        let mut func = shadow_fetch(CompareFunc::LessEqual);
        assert!(lower_shadow_compare(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.handle, v1.f32x2, v2.f32) {
    block0:
        v4.f32 = tex v0 v1 [2d];
        v5.i1 = fge v4 v2;
        v6.f32 = b2f v5;
        return v6;
}
"
        );
        assert!(!lower_shadow_compare(&mut func));
    }

    #[test]
    fn less_compares_reference_first() {
        let mut func = shadow_fetch(CompareFunc::Less);
        assert!(lower_shadow_compare(&mut func));
        assert!(dump_func(&func).contains("v5.i1 = flt v2 v4;"));
    }

    #[test]
    fn constant_functions_fold() {
        let mut func = shadow_fetch(CompareFunc::Always);
        assert!(lower_shadow_compare(&mut func));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.handle, v1.f32x2, v2.f32) {
    block0:
        return 1.0.f32;
}
"
        );
    }
}
