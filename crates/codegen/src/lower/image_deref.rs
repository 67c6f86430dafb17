//! Lowers deref-addressed image operations to binding indices.
//!
//! The image operand of an image intrinsic is either a `deref_var` or a
//! `deref_array` of one. It is replaced in place by the variable's binding,
//! plus the array index when there is one. With `bindless_only`, only
//! variables reached through the bindless table are rewritten, and they
//! become bindless handles instead.
use cadenza_ir::{
    inst::{AluOp, ImageAddressing, Intrinsic, Payload},
    metadata::Metadata,
    FuncCursor, Function, InstId, InstInserter, Opcode, Src, Type, ValueId, VarId,
};

use crate::pass::apply_fn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerImageConfig {
    /// Rewrite bindless variables only, into bindless handles.
    pub bindless_only: bool,
}

pub fn lower_image_derefs(func: &mut Function, config: LowerImageConfig) -> bool {
    let _span = tracing::debug_span!("lower_image_derefs", func = %func.name).entered();

    let changed = apply_fn(
        func,
        |cursor, func, inst| lower_inst(cursor, func, inst, config),
        Metadata::CONTROL_FLOW,
    );

    tracing::debug!(changed);
    changed
}

fn lower_inst(
    cursor: &mut InstInserter,
    func: &mut Function,
    inst: InstId,
    config: LowerImageConfig,
) -> bool {
    let data = func.dfg.inst(inst);
    if !is_image_op(data.opcode) {
        return false;
    }
    match data.payload.image() {
        Some(image) if image.addressing == ImageAddressing::Deref => {}
        _ => return false,
    }

    let Some((var, index)) = resolve_deref(func, data.src(0).value) else {
        return false;
    };
    let var_data = &func.vars[var];
    if config.bindless_only && !var_data.bindless {
        return false;
    }
    let binding = var_data.binding;

    let base = func.dfg.make_imm_value(binding);
    let slot = match index {
        Some(index) => cursor.alu(func, AluOp::Iadd, &[base, index], Type::I32),
        None => base,
    };

    let (operand, addressing) = if config.bindless_only {
        let handle = cursor.intrinsic(
            func,
            Intrinsic::BindlessHandle,
            &[slot],
            Payload::None,
            Type::HANDLE,
        );
        (handle, ImageAddressing::Bindless)
    } else {
        (slot, ImageAddressing::Indexed)
    };

    tracing::trace!(%inst, %var, ?addressing, "lowered image deref");
    func.dfg.rewrite_src(inst, 0, Src::new(operand));
    if let Some(image) = func.dfg.payload_mut(inst).image_mut() {
        image.addressing = addressing;
    }
    true
}

pub(crate) fn is_image_op(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Intrinsic(
            Intrinsic::ImageLoad
                | Intrinsic::ImageStore
                | Intrinsic::ImageAtomic
                | Intrinsic::ImageTexelAddress
        )
    )
}

/// Follows a deref chain back to its variable. Returns the variable and the
/// array index applied to it, if any.
pub(crate) fn resolve_deref(func: &Function, value: ValueId) -> Option<(VarId, Option<ValueId>)> {
    let inst = func.dfg.value_inst(value)?;
    let data = func.dfg.inst(inst);
    match data.opcode {
        Opcode::Intrinsic(Intrinsic::DerefVar) => match data.payload {
            Payload::Deref(var) => Some((var, None)),
            _ => None,
        },
        Opcode::Intrinsic(Intrinsic::DerefArray) => {
            let (var, index) = resolve_deref(func, data.src(0).value)?;
            assert!(
                index.is_none(),
                "`{inst}` indexes an array of arrays, which images do not have"
            );
            Some((var, Some(data.src(1).value)))
        }
        _ => None,
    }
}
