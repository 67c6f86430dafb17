//! Natural loop detection.
use cranelift_entity::{entity_impl, packed_option::PackedOption, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::{cfg::ControlFlowGraph, domtree::DomTree, BlockId};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopTree {
    /// Loops in header RPO, so an outer loop always precedes its inner loops.
    loops: PrimaryMap<Loop, LoopData>,

    /// Maps each block to the innermost loop containing it.
    block_to_loop: SecondaryMap<BlockId, PackedOption<Loop>>,
}

impl LoopTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, cfg: &ControlFlowGraph, domtree: &DomTree) {
        self.clear();

        for &block in domtree.rpo() {
            let is_header = cfg
                .preds_of(block)
                .any(|&pred| domtree.dominates(block, pred));
            if is_header {
                self.loops.push(LoopData {
                    header: block,
                    parent: None.into(),
                    children: SmallVec::new(),
                });
            }
        }

        // Inner loops are visited first so that a block ends up mapped to its
        // innermost loop.
        let mut worklist = Vec::new();
        for lp in self.loops.keys().rev() {
            let header = self.loops[lp].header;
            worklist.extend(
                cfg.preds_of(header)
                    .copied()
                    .filter(|&pred| domtree.dominates(header, pred)),
            );

            while let Some(block) = worklist.pop() {
                match self.block_to_loop[block].expand() {
                    Some(inner) => {
                        let outermost = self.outermost_parent(inner);
                        if outermost == lp {
                            continue;
                        }
                        self.loops[outermost].parent = lp.into();
                        self.loops[lp].children.push(outermost);
                        let inner_header = self.loops[outermost].header;
                        worklist.extend(
                            cfg.preds_of(inner_header)
                                .copied()
                                .filter(|&pred| !domtree.dominates(inner_header, pred)),
                        );
                    }
                    None => {
                        self.block_to_loop[block] = lp.into();
                        if block != header {
                            worklist.extend(cfg.preds_of(block).copied());
                        }
                    }
                }
            }
        }
    }

    /// Returns all loops, outer loops first.
    pub fn loops(&self) -> impl DoubleEndedIterator<Item = Loop> {
        self.loops.keys()
    }

    pub fn loop_num(&self) -> usize {
        self.loops.len()
    }

    pub fn loop_header(&self, lp: Loop) -> BlockId {
        self.loops[lp].header
    }

    pub fn parent_loop(&self, lp: Loop) -> Option<Loop> {
        self.loops[lp].parent.expand()
    }

    pub fn children_of(&self, lp: Loop) -> &[Loop] {
        &self.loops[lp].children
    }

    /// Returns the innermost loop containing `block`.
    pub fn loop_of_block(&self, block: BlockId) -> Option<Loop> {
        self.block_to_loop[block].expand()
    }

    pub fn is_in_loop(&self, block: BlockId, lp: Loop) -> bool {
        let mut current = self.loop_of_block(block);
        while let Some(cur) = current {
            if cur == lp {
                return true;
            }
            current = self.parent_loop(cur);
        }
        false
    }

    pub fn clear(&mut self) {
        self.loops.clear();
        self.block_to_loop.clear();
    }

    fn outermost_parent(&self, mut lp: Loop) -> Loop {
        while let Some(parent) = self.parent_loop(lp) {
            lp = parent;
        }
        lp
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Loop(u32);
entity_impl!(Loop, "loop");

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoopData {
    header: BlockId,
    parent: PackedOption<Loop>,
    children: SmallVec<[Loop; 4]>,
}
