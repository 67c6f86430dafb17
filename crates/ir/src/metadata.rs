//! Derived analyses cached on a function, with per-kind validity.
//!
//! A kind is either valid or stale. Passes mark the kinds they did not
//! preserve as stale; consumers call [`Function::require`] which recomputes
//! stale kinds on demand.
use bitflags::bitflags;
use cranelift_entity::SecondaryMap;

use crate::{
    cfg::ControlFlowGraph, domtree::DomTree, loop_analysis::LoopTree, BlockId, Function,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Metadata: u8 {
        /// Position of every block in layout order.
        const BLOCK_INDEX = 1 << 0;
        /// Control flow graph and dominator tree.
        const DOMINANCE = 1 << 1;
        const LOOP_ANALYSIS = 1 << 2;
    }
}

impl Metadata {
    pub const NONE: Self = Self::empty();
    pub const CONTROL_FLOW: Self = Self::BLOCK_INDEX
        .union(Self::DOMINANCE)
        .union(Self::LOOP_ANALYSIS);

    /// Adds the kinds each requested kind is computed from.
    fn with_dependencies(self) -> Self {
        let mut kinds = self;
        if kinds.contains(Self::LOOP_ANALYSIS) {
            kinds |= Self::DOMINANCE;
        }
        if kinds.contains(Self::DOMINANCE) {
            kinds |= Self::BLOCK_INDEX;
        }
        kinds
    }

    /// Adds the kinds computed from any kind in `self`.
    fn with_dependents(self) -> Self {
        let mut kinds = self;
        if kinds.contains(Self::DOMINANCE) {
            kinds |= Self::LOOP_ANALYSIS;
        }
        kinds
    }
}

#[derive(Debug, Clone, Default)]
pub struct FuncMetadata {
    valid: Metadata,
    block_index: SecondaryMap<BlockId, u32>,
    cfg: ControlFlowGraph,
    domtree: DomTree,
    loop_tree: LoopTree,
}

impl FuncMetadata {
    pub fn valid(&self) -> Metadata {
        self.valid
    }

    pub fn is_valid(&self, kinds: Metadata) -> bool {
        self.valid.contains(kinds)
    }

    pub fn block_index(&self, block: BlockId) -> u32 {
        self.assert_valid(Metadata::BLOCK_INDEX);
        self.block_index[block]
    }

    pub fn cfg(&self) -> &ControlFlowGraph {
        self.assert_valid(Metadata::DOMINANCE);
        &self.cfg
    }

    pub fn domtree(&self) -> &DomTree {
        self.assert_valid(Metadata::DOMINANCE);
        &self.domtree
    }

    pub fn loop_tree(&self) -> &LoopTree {
        self.assert_valid(Metadata::LOOP_ANALYSIS);
        &self.loop_tree
    }

    pub(crate) fn invalidate(&mut self, kinds: Metadata) {
        let kinds = kinds.with_dependents();
        let stale = self.valid & kinds;
        if !stale.is_empty() {
            tracing::trace!(?stale, "metadata invalidated");
        }
        self.valid.remove(kinds);
    }

    pub(crate) fn require(&mut self, func: &Function, kinds: Metadata) {
        let missing = kinds.with_dependencies() - self.valid;
        if missing.is_empty() {
            return;
        }
        tracing::trace!(?missing, "recomputing metadata");

        if missing.contains(Metadata::BLOCK_INDEX) {
            self.block_index.clear();
            for (idx, block) in func.layout.iter_block().enumerate() {
                self.block_index[block] = idx as u32;
            }
        }
        if missing.contains(Metadata::DOMINANCE) {
            self.cfg.compute(func);
            self.domtree.compute(&self.cfg);
        }
        if missing.contains(Metadata::LOOP_ANALYSIS) {
            self.loop_tree.compute(&self.cfg, &self.domtree);
        }
        self.valid |= missing;
    }

    fn assert_valid(&self, kinds: Metadata) {
        assert!(
            self.valid.contains(kinds),
            "{kinds:?} is stale; call `Function::require` first"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::test_util::func_builder, Type};

    fn diamond() -> (Function, [BlockId; 4]) {
        let mut builder = func_builder(&[Type::I1]);
        let blocks = [(); 4].map(|_| builder.append_block());
        let [entry, then_block, else_block, merge] = blocks;
        let cond = builder.arg(0);

        builder.switch_to_block(entry);
        builder.br(cond, then_block, else_block);
        builder.switch_to_block(then_block);
        builder.jump(merge);
        builder.switch_to_block(else_block);
        builder.jump(merge);
        builder.switch_to_block(merge);
        builder.ret(&[]);
        (builder.finish(), blocks)
    }

    #[test]
    fn require_is_lazy_and_transitive() {
        let (mut func, [entry, _, else_block, merge]) = diamond();
        assert!(func.metadata().valid().is_empty());

        let md = func.require(Metadata::LOOP_ANALYSIS);
        assert!(md.is_valid(Metadata::CONTROL_FLOW));
        assert_eq!(md.block_index(else_block), 2);
        assert_eq!(md.domtree().idom_of(merge), Some(entry));
        assert_eq!(md.loop_tree().loop_num(), 0);
    }

    #[test]
    fn invalidating_dominance_stales_loops() {
        let (mut func, _) = diamond();
        func.require(Metadata::all());

        func.preserve_only(Metadata::BLOCK_INDEX | Metadata::LOOP_ANALYSIS);
        assert_eq!(func.metadata().valid(), Metadata::BLOCK_INDEX);

        func.invalidate(Metadata::BLOCK_INDEX);
        assert!(func.metadata().valid().is_empty());
    }

    #[test]
    #[should_panic(expected = "stale")]
    fn reading_stale_kind() {
        let (func, _) = diamond();
        func.metadata().domtree();
    }
}
