//! The per-instruction pass runner.
//!
//! [`apply`] walks every block in layout order and every instruction in
//! program order, handing each one to an [`InstPass`] with a cursor
//! positioned in front of it. The next instruction is captured before the
//! callback runs, so the callback may insert around, move, or remove the
//! current instruction. Blocks created by the callback ahead of the
//! captured position are not visited.
use cadenza_ir::{
    metadata::Metadata, BlockId, CursorLocation, FuncCursor, Function, InstId, InstInserter,
};

pub trait InstPass {
    fn enter_block(&mut self, _func: &mut Function, _block: BlockId) {}

    /// Returns `true` if the function was modified.
    fn visit_inst(&mut self, cursor: &mut InstInserter, func: &mut Function, inst: InstId)
        -> bool;

    /// Called once the walk has left the block entered last. Returns `true`
    /// if the function was modified.
    fn leave_block(&mut self, _func: &mut Function, _block: BlockId) -> bool {
        false
    }
}

/// Runs `pass` over `func` and returns `true` if anything changed.
///
/// Every metadata kind outside `preserves` is invalidated once the walk
/// finishes, whether or not anything changed. The declaration is trusted.
pub fn apply<P>(func: &mut Function, pass: &mut P, preserves: Metadata) -> bool
where
    P: InstPass + ?Sized,
{
    let mut changed = false;
    let mut cursor = InstInserter::default();

    let mut next_block = func.layout.entry_block();
    while let Some(block) = next_block {
        pass.enter_block(func, block);

        // The walk may continue into a block split off from `block`.
        let mut current_block = block;
        let mut next_inst = func.layout.first_inst_of(block);
        while let Some(inst) = next_inst {
            next_inst = func.layout.next_inst_of(inst);
            current_block = func.layout.inst_block(inst);

            cursor.set_location(CursorLocation::Before(inst));
            changed |= pass.visit_inst(&mut cursor, func, inst);
        }

        changed |= pass.leave_block(func, block);
        next_block = func.layout.next_block_of(current_block);
    }

    func.preserve_only(preserves);
    changed
}

/// Runs a closure as an [`InstPass`].
pub fn apply_fn<F>(func: &mut Function, f: F, preserves: Metadata) -> bool
where
    F: FnMut(&mut InstInserter, &mut Function, InstId) -> bool,
{
    apply(func, &mut FnPass(f), preserves)
}

struct FnPass<F>(F);

impl<F> InstPass for FnPass<F>
where
    F: FnMut(&mut InstInserter, &mut Function, InstId) -> bool,
{
    fn visit_inst(
        &mut self,
        cursor: &mut InstInserter,
        func: &mut Function,
        inst: InstId,
    ) -> bool {
        (self.0)(cursor, func, inst)
    }
}
