//! Lowers image atomics to global atomics on the texel address.
//!
//! `image_atomic image coord sample data..` becomes
//! `global_atomic (image_texel_address image coord sample) data..` with the
//! same atomic operation. Uses of the old result are redirected and the
//! image atomic is removed.
use cadenza_ir::{
    inst::{InstData, Intrinsic, Payload},
    metadata::Metadata,
    FuncCursor, Function, InstId, InstInserter, Src, Type,
};
use smallvec::SmallVec;

use crate::pass::apply_fn;

pub fn lower_image_atomics(func: &mut Function) -> bool {
    let _span = tracing::debug_span!("lower_image_atomics", func = %func.name).entered();
    let changed = apply_fn(func, lower_inst, Metadata::CONTROL_FLOW);
    tracing::debug!(changed);
    changed
}

fn lower_inst(cursor: &mut InstInserter, func: &mut Function, inst: InstId) -> bool {
    let data = func.dfg.inst(inst);
    if !data.is_intrinsic(Intrinsic::ImageAtomic) {
        return false;
    }

    let mut image = match data.payload {
        Payload::Image(image) => image,
        ref payload => panic!("image atomic `{inst}` carries `{payload:?}`"),
    };
    let op = match image.atomic.take() {
        Some(op) => op,
        None => panic!("image atomic `{inst}` has no atomic operation"),
    };
    let num_data = data.srcs.len() - 3;
    assert_eq!(
        num_data,
        op.num_data(),
        "`{inst}` supplies {num_data} data sources to `{op:?}`"
    );

    let addr_srcs: SmallVec<[Src; 3]> = data.srcs[..3].iter().copied().collect();
    let mut atomic_srcs: SmallVec<[Src; 4]> = data.srcs[3..].iter().copied().collect();
    let access = image.access;
    let old = func.dfg.inst_results(inst)[0];
    let ty = func.dfg.value_ty(old);

    let addr = cursor.emit_value(
        func,
        InstData::new(Intrinsic::ImageTexelAddress, &addr_srcs)
            .with_payload(Payload::Image(image)),
        Type::I32,
    );
    atomic_srcs.insert(0, Src::new(addr));
    let new = cursor.emit_value(
        func,
        InstData::new(Intrinsic::GlobalAtomic, &atomic_srcs)
            .with_payload(Payload::Atomic { op, access }),
        ty,
    );

    tracing::trace!(%inst, "lowered image atomic");
    func.dfg.replace_all_uses(old, new);
    cursor.remove_inst(func, inst);
    true
}
