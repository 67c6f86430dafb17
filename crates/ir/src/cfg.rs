//! Control flow graph derived from block terminators.
use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use crate::{BlockId, Function};

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowGraph {
    entry: PackedOption<BlockId>,
    blocks: SecondaryMap<BlockId, BlockNode>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, func: &Function) {
        self.clear();
        self.entry = func.layout.entry_block().into();

        for block in func.layout.iter_block() {
            let Some(last) = func.layout.last_inst_of(block) else {
                continue;
            };
            for &dest in func.dfg.inst(last).branch_dests() {
                self.add_edge(block, dest);
            }
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry.expand()
    }

    pub fn preds_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].preds.iter()
    }

    pub fn succs_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].succs.iter()
    }

    pub fn pred_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].preds.len()
    }

    pub fn succ_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].succs.len()
    }

    pub fn is_pred(&self, pred: BlockId, of: BlockId) -> bool {
        self.blocks[of].preds.contains(&pred)
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from].succs.insert(to);
        self.blocks[to].preds.insert(from);
    }

    pub fn remove_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from].succs.remove(&to);
        self.blocks[to].preds.remove(&from);
    }

    /// Returns blocks reachable from the entry in post order.
    pub fn post_order(&self) -> CfgPostOrder<'_> {
        CfgPostOrder::new(self)
    }

    pub fn clear(&mut self) {
        self.entry = None.into();
        self.blocks.clear();
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
struct BlockNode {
    preds: BTreeSet<BlockId>,
    succs: BTreeSet<BlockId>,
}

pub struct CfgPostOrder<'a> {
    cfg: &'a ControlFlowGraph,
    visited: SecondaryMap<BlockId, bool>,
    /// Each entry is a block and whether its successors were already pushed.
    stack: Vec<(BlockId, bool)>,
}

impl<'a> CfgPostOrder<'a> {
    fn new(cfg: &'a ControlFlowGraph) -> Self {
        let mut visited = SecondaryMap::default();
        let stack = match cfg.entry() {
            Some(entry) => {
                visited[entry] = true;
                vec![(entry, false)]
            }
            None => Vec::new(),
        };

        Self {
            cfg,
            visited,
            stack,
        }
    }
}

impl Iterator for CfgPostOrder<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        while let Some((block, expanded)) = self.stack.pop() {
            if expanded {
                return Some(block);
            }

            self.stack.push((block, true));
            for &succ in self.cfg.succs_of(block) {
                if !self.visited[succ] {
                    self.visited[succ] = true;
                    self.stack.push((succ, false));
                }
            }
        }

        None
    }
}
