//! Retags `bcsel` as `fcsel` where the selected value is known to be float.
//!
//! Classification runs over the whole function first, so uses that come
//! after a select in program order are already accounted for when the
//! rewrite walk reaches it.
use cadenza_ir::{inst::AluOp, metadata::Metadata, Function};

use super::type_classes::gather_types;
use crate::pass::apply_fn;

pub fn run_specialize_select(func: &mut Function) -> bool {
    let _span = tracing::debug_span!("specialize_select", func = %func.name).entered();

    let classes = gather_types(func);
    let changed = apply_fn(
        func,
        |_, func, inst| {
            if !func.dfg.inst(inst).is_alu(AluOp::Bcsel) {
                return false;
            }

            let dest = func.dfg.inst_results(inst)[0];
            if !classes.is_float(dest) {
                return false;
            }

            tracing::trace!(%inst, "bcsel -> fcsel");
            func.dfg.set_opcode(inst, AluOp::Fcsel.into());
            true
        },
        Metadata::CONTROL_FLOW,
    );

    tracing::debug!(changed);
    changed
}
