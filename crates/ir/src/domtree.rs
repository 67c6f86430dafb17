//! This module contains dominator tree related structs.
//!
//! The algorithm is based on Keith D. Cooper., Timothy J. Harvey., and Ken Kennedy.: A Simple, Fast Dominance Algorithm:
//! <https://www.cs.rice.edu/~keith/EMBED/dom.pdf>
use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use crate::{cfg::ControlFlowGraph, BlockId};

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DomTree {
    doms: SecondaryMap<BlockId, PackedOption<BlockId>>,
    /// Position of each reachable block in `rpo`, counted from one.
    rpo_nums: SecondaryMap<BlockId, u32>,
    rpo: Vec<BlockId>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.doms.clear();
        self.rpo_nums.clear();
        self.rpo.clear();
    }

    pub fn compute(&mut self, cfg: &ControlFlowGraph) {
        self.clear();

        self.rpo = cfg.post_order().collect();
        self.rpo.reverse();
        for (i, &block) in self.rpo.iter().enumerate() {
            self.rpo_nums[block] = i as u32 + 1;
        }

        let Some(&entry) = self.rpo.first() else {
            return;
        };
        self.doms[entry] = entry.into();

        let mut changed = true;
        while changed {
            changed = false;
            for &block in &self.rpo[1..] {
                let mut new_dom: Option<BlockId> = None;
                for &pred in cfg.preds_of(block) {
                    if self.doms[pred].is_none() {
                        continue;
                    }
                    new_dom = Some(match new_dom {
                        Some(dom) => self.intersect(dom, pred),
                        None => pred,
                    });
                }

                if let Some(new_dom) = new_dom {
                    if self.doms[block].expand() != Some(new_dom) {
                        self.doms[block] = new_dom.into();
                        changed = true;
                    }
                }
            }
        }
    }

    /// Returns the immediate dominator of `block`.
    /// Returns `None` for the entry block and for unreachable blocks.
    pub fn idom_of(&self, block: BlockId) -> Option<BlockId> {
        if self.rpo.first() == Some(&block) {
            return None;
        }
        self.doms[block].expand()
    }

    /// Returns `true` if `block` is reachable from the entry block.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_nums[block] != 0
    }

    /// Returns `true` if `block1` dominates `block2`.
    pub fn dominates(&self, block1: BlockId, block2: BlockId) -> bool {
        block1 == block2 || self.strictly_dominates(block1, block2)
    }

    /// Returns `true` if `block1` strictly dominates `block2`.
    pub fn strictly_dominates(&self, block1: BlockId, block2: BlockId) -> bool {
        if !self.is_reachable(block1) || !self.is_reachable(block2) {
            return false;
        }

        let mut current = block2;
        while let Some(idom) = self.idom_of(current) {
            if idom == block1 {
                return true;
            }
            // Dominators always precede in RPO.
            if self.rpo_nums[idom] < self.rpo_nums[block1] {
                return false;
            }
            current = idom;
        }
        false
    }

    /// Returns reachable blocks in reverse post order.
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    /// Compute dominance frontiers of each block.
    pub fn compute_df(&self, cfg: &ControlFlowGraph) -> DFSet {
        let mut df = DFSet::default();

        for &block in &self.rpo {
            if cfg.pred_num_of(block) < 2 {
                continue;
            }
            let Some(idom) = self.idom_of(block) else {
                continue;
            };
            for &pred in cfg.preds_of(block) {
                let mut runner = pred;
                while runner != idom && self.is_reachable(runner) {
                    df.0[runner].insert(block);
                    match self.idom_of(runner) {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }

        df
    }

    fn intersect(&self, mut b1: BlockId, mut b2: BlockId) -> BlockId {
        while b1 != b2 {
            while self.rpo_nums[b1] > self.rpo_nums[b2] {
                b1 = self.doms[b1].expect("processed block has a dominator");
            }
            while self.rpo_nums[b2] > self.rpo_nums[b1] {
                b2 = self.doms[b2].expect("processed block has a dominator");
            }
        }
        b1
    }
}

/// Dominance frontiers of each block.
#[derive(Default, Debug)]
pub struct DFSet(SecondaryMap<BlockId, BTreeSet<BlockId>>);

impl DFSet {
    pub fn frontiers(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.0[block].iter()
    }

    pub fn in_frontier_of(&self, block: BlockId, of: BlockId) -> bool {
        self.0[of].contains(&block)
    }

    pub fn frontier_num_of(&self, of: BlockId) -> usize {
        self.0[of].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::test_util::func_builder, Function, Type};

    fn calc_dom(func: &Function) -> (DomTree, DFSet) {
        let mut cfg = ControlFlowGraph::default();
        cfg.compute(func);
        let mut domtree = DomTree::default();
        domtree.compute(&cfg);
        let df = domtree.compute_df(&cfg);
        (domtree, df)
    }

    #[test]
    fn if_else() {
        let mut builder = func_builder(&[Type::I1]);
        let entry = builder.append_block();
        let then_block = builder.append_block();
        let else_block = builder.append_block();
        let merge = builder.append_block();

        builder.switch_to_block(entry);
        let cond = builder.arg(0);
        builder.br(cond, then_block, else_block);
        builder.switch_to_block(then_block);
        builder.jump(merge);
        builder.switch_to_block(else_block);
        builder.jump(merge);
        builder.switch_to_block(merge);
        builder.ret(&[]);

        let func = builder.finish();
        let (domtree, df) = calc_dom(&func);
        assert_eq!(domtree.idom_of(entry), None);
        assert_eq!(domtree.idom_of(then_block), Some(entry));
        assert_eq!(domtree.idom_of(else_block), Some(entry));
        assert_eq!(domtree.idom_of(merge), Some(entry));
        assert!(domtree.is_reachable(entry));
        assert!(!domtree.dominates(then_block, merge));

        assert_eq!(df.frontier_num_of(entry), 0);
        assert!(df.in_frontier_of(merge, then_block));
        assert!(df.in_frontier_of(merge, else_block));
        assert_eq!(df.frontier_num_of(merge), 0);
    }

    #[test]
    fn unreachable_block() {
        let mut builder = func_builder(&[Type::I1]);
        let a = builder.append_block();
        let b = builder.append_block();
        let c = builder.append_block();
        let d = builder.append_block();

        builder.switch_to_block(a);
        builder.jump(b);
        builder.switch_to_block(b);
        builder.jump(c);
        builder.switch_to_block(d);
        builder.jump(c);
        builder.switch_to_block(c);
        builder.ret(&[]);

        let func = builder.finish();
        let (domtree, _) = calc_dom(&func);
        assert_eq!(domtree.idom_of(c), Some(b));
        assert_eq!(domtree.idom_of(d), None);
        assert!(!domtree.is_reachable(d));
        assert!(!domtree.dominates(d, c));
        assert!(domtree.dominates(a, c));
    }

    #[test]
    fn loop_header_dominates_latch() {
        let mut builder = func_builder(&[Type::I1]);
        let entry = builder.append_block();
        let header = builder.append_block();
        let latch = builder.append_block();
        let exit = builder.append_block();

        builder.switch_to_block(entry);
        builder.jump(header);
        builder.switch_to_block(header);
        let cond = builder.arg(0);
        builder.br(cond, latch, exit);
        builder.switch_to_block(latch);
        builder.jump(header);
        builder.switch_to_block(exit);
        builder.ret(&[]);

        let func = builder.finish();
        let (domtree, df) = calc_dom(&func);
        assert_eq!(domtree.idom_of(latch), Some(header));
        assert_eq!(domtree.idom_of(exit), Some(header));
        assert!(domtree.strictly_dominates(entry, latch));
        assert!(df.in_frontier_of(header, latch));
        assert!(df.in_frontier_of(header, header));
    }
}
