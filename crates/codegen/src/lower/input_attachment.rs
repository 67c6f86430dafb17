//! Lowers input attachment reads to arrayed 2D image loads.
//!
//! A load from a subpass image reads at an offset from the current fragment.
//! The offset coordinate is replaced by
//! `vec(f2i(frag_coord) + offset, layer)`, and the load becomes a 2D array
//! load. Once every load is rewritten, the variables behind them are
//! retyped and the remaining image operations on those variables are walked
//! again, getting the same coordinate rewrite, so every operation agrees
//! with the new declaration.
use cadenza_ir::{
    inst::{AluOp, ImageAddressing, Intrinsic, Payload},
    metadata::Metadata,
    FuncCursor, Function, ImageDim, InstId, InstInserter, Src, Type, ValueId, VarId,
};
use indexmap::IndexSet;

use super::image_deref::{is_image_op, resolve_deref};
use crate::pass::{apply, apply_fn, InstPass};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputAttachmentConfig {
    /// Use the layer id as the array layer.
    pub use_layer_id: bool,
    /// Use the view id as the array layer. Takes precedence over
    /// `use_layer_id`.
    pub use_view_id: bool,
}

pub fn lower_input_attachments(func: &mut Function, config: InputAttachmentConfig) -> bool {
    let _span = tracing::debug_span!("lower_input_attachments", func = %func.name).entered();

    let mut lowering = SubpassLoadLowering {
        config,
        retyped: IndexSet::default(),
    };
    let mut changed = apply(func, &mut lowering, Metadata::CONTROL_FLOW);

    let retyped = lowering.retyped;
    if !retyped.is_empty() {
        for &var in &retyped {
            if let Some(image) = func.vars[var].image_var_mut() {
                if image.dim.is_subpass() {
                    tracing::trace!(%var, "retyped to 2d array");
                    image.dim = ImageDim::Dim2D;
                    image.arrayed = true;
                }
            }
        }
        changed |= apply_fn(
            func,
            |cursor, func, inst| lower_dependent(cursor, func, inst, config, &retyped),
            Metadata::CONTROL_FLOW,
        );
    }

    tracing::debug!(changed);
    changed
}

/// Rewrites subpass loads. A multisampled attachment is read as a plain
/// layer; its sample source is left as it is.
struct SubpassLoadLowering {
    config: InputAttachmentConfig,
    retyped: IndexSet<VarId>,
}

impl InstPass for SubpassLoadLowering {
    fn visit_inst(
        &mut self,
        cursor: &mut InstInserter,
        func: &mut Function,
        inst: InstId,
    ) -> bool {
        let data = func.dfg.inst(inst);
        if !data.is_intrinsic(Intrinsic::ImageLoad) {
            return false;
        }
        let image = match data.payload.image() {
            Some(image) if image.dim.is_subpass() => *image,
            _ => return false,
        };
        let image_src = data.src(0).value;

        tracing::trace!(%inst, "lowered subpass load");
        lower_coord(cursor, func, inst, self.config);

        if image.addressing == ImageAddressing::Deref {
            if let Some((var, _)) = resolve_deref(func, image_src) {
                self.retyped.insert(var);
            }
        }
        true
    }
}

/// Lowers an image operation that still addresses a retyped variable as a
/// subpass image.
fn lower_dependent(
    cursor: &mut InstInserter,
    func: &mut Function,
    inst: InstId,
    config: InputAttachmentConfig,
    retyped: &IndexSet<VarId>,
) -> bool {
    let data = func.dfg.inst(inst);
    if !is_image_op(data.opcode) {
        return false;
    }
    match data.payload.image() {
        Some(image) if image.addressing == ImageAddressing::Deref && image.dim.is_subpass() => {}
        _ => return false,
    }

    let Some((var, _)) = resolve_deref(func, data.src(0).value) else {
        return false;
    };
    if !retyped.contains(&var) {
        return false;
    }

    tracing::trace!(%inst, %var, "lowered subpass image op");
    lower_coord(cursor, func, inst, config);
    true
}

/// Replaces the fragment-relative offset in source 1 of `inst` by an
/// absolute layered coordinate and marks the operation as a 2D array access.
fn lower_coord(
    cursor: &mut InstInserter,
    func: &mut Function,
    inst: InstId,
    config: InputAttachmentConfig,
) {
    let offset = func.dfg.inst(inst).src(1).value;
    let offset_ty = func.dfg.value_ty(offset);
    assert_eq!(
        offset_ty,
        Type::I32.vec(2),
        "subpass access `{inst}` takes an i32x2 offset, found {offset_ty}"
    );

    let frag_coord = cursor.intrinsic(
        func,
        Intrinsic::FragCoord,
        &[],
        Payload::None,
        Type::F32.vec(2),
    );
    let pixel = cursor.alu(func, AluOp::F2i, &[frag_coord], Type::I32.vec(2));
    let pos = cursor.alu(func, AluOp::Iadd, &[pixel, offset], Type::I32.vec(2));
    let layer = emit_layer(cursor, func, config);
    let coord = cursor.alu(func, AluOp::Vec, &[pos, layer], Type::I32.vec(3));

    func.dfg.rewrite_src(inst, 1, Src::new(coord));
    if let Some(image) = func.dfg.payload_mut(inst).image_mut() {
        image.dim = ImageDim::Dim2D;
        image.arrayed = true;
    }
}

fn emit_layer(
    cursor: &mut InstInserter,
    func: &mut Function,
    config: InputAttachmentConfig,
) -> ValueId {
    let intr = if config.use_view_id {
        Intrinsic::ViewId
    } else if config.use_layer_id {
        Intrinsic::LayerId
    } else {
        return func.dfg.make_imm_value(0i32);
    };
    cursor.intrinsic(func, intr, &[], Payload::None, Type::I32)
}

#[cfg(test)]
mod tests {
    use cadenza_ir::{
        builder::test_util::{dump_func, func_builder},
        inst::ImagePayload,
        ImageFormat, ImageVar, VarData,
    };

    use super::*;

    fn build() -> Function {
        let mut builder = func_builder(&[Type::I32.vec(2)]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let offset = builder.arg(0);

        let var = builder.declare_var(VarData::image(
            "color",
            1,
            ImageVar {
                dim: ImageDim::Subpass,
                arrayed: false,
                format: ImageFormat::Rgba8Unorm,
            },
        ));
        let zero = builder.imm(0i32);
        let payload = Payload::Image(ImagePayload::new(ImageDim::Subpass));

        let image = builder.deref_var(var);
        let texel = builder.intrinsic(
            Intrinsic::ImageLoad,
            &[image, offset, zero],
            payload,
            Type::F32,
        );
        let addr = builder.intrinsic(
            Intrinsic::ImageTexelAddress,
            &[image, offset, zero],
            payload,
            Type::I32,
        );
        builder.ret(&[texel, addr]);
        builder.finish()
    }

    #[test]
    fn subpass_loads_read_at_fragment() {
        let mut func = build();
        let config = InputAttachmentConfig {
            use_layer_id: true,
            use_view_id: false,
        };
        assert!(lower_input_attachments(&mut func, config));
        assert_eq!(
            dump_func(&func),
            "func %test_func(v0.i32x2) {
    block0:
        v2.handle = deref_var [var0];
        v5.f32x2 = frag_coord;
        v6.i32x2 = f2i v5;
        v7.i32x2 = iadd v6 v0;
        v8.i32 = layer_id;
        v9.i32x3 = vec v7 v8;
        v3.f32 = image_load v2 v9 0.i32 [2d deref array];
        v10.f32x2 = frag_coord;
        v11.i32x2 = f2i v10;
        v12.i32x2 = iadd v11 v0;
        v13.i32 = layer_id;
        v14.i32x3 = vec v12 v13;
        v4.i32 = image_texel_address v2 v14 0.i32 [2d deref array];
        return v3 v4;
}
"
        );

        let var = func.vars.keys().next().unwrap();
        let declared = func.vars[var].image_var().unwrap();
        assert_eq!(declared.dim, ImageDim::Dim2D);
        assert!(declared.arrayed);

        assert!(!lower_input_attachments(&mut func, config));
    }

    #[test]
    fn layer_defaults_to_zero() {
        let mut func = build();
        assert!(lower_input_attachments(
            &mut func,
            InputAttachmentConfig::default()
        ));

        let dump = dump_func(&func);
        assert!(dump.contains("vec v7 0.i32;"), "{dump}");
        assert!(!dump.contains("layer_id"));
    }

    #[test]
    fn view_id_wins_over_layer_id() {
        let mut func = build();
        let config = InputAttachmentConfig {
            use_layer_id: true,
            use_view_id: true,
        };
        assert!(lower_input_attachments(&mut func, config));

        let dump = dump_func(&func);
        assert!(dump.contains("v8.i32 = view_id;"), "{dump}");
    }

    #[test]
    #[should_panic(expected = "takes an i32x2 offset")]
    fn offset_type_mismatch() {
        let mut builder = func_builder(&[Type::F32.vec(2)]);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let offset = builder.arg(0);
        let zero = builder.imm(0i32);
        let payload = Payload::Image(ImagePayload::new(ImageDim::Subpass));
        let texel = builder.intrinsic(
            Intrinsic::ImageLoad,
            &[zero, offset, zero],
            payload,
            Type::F32,
        );
        builder.ret(&[texel]);
        let mut func = builder.finish();

        lower_input_attachments(&mut func, InputAttachmentConfig::default());
    }
}
