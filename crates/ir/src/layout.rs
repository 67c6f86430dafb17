//! Program order of a function: the block list and the instruction list of
//! each block, kept as intrusive doubly linked lists over entity maps.
//!
//! Linking never moves other nodes, so an instruction id captured before an
//! insertion or removal elsewhere stays a valid position.
use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use crate::{BlockId, InstId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<BlockId, BlockNode>,
    insts: SecondaryMap<InstId, InstNode>,
    entry_block: PackedOption<BlockId>,
    last_block: PackedOption<BlockId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry_block.expand()
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block.expand()
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        self.blocks[block].inserted
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.insts[inst].block.is_some()
    }

    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.first_inst_of(block).is_none()
    }

    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].next.expand()
    }

    pub fn prev_block_of(&self, block: BlockId) -> Option<BlockId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].prev.expand()
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].first_inst.expand()
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].last_inst.expand()
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].next.expand()
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].prev.expand()
    }

    /// Returns the block containing `inst`.
    ///
    /// # Panics
    /// Panics if `inst` is not in the layout.
    pub fn inst_block(&self, inst: InstId) -> BlockId {
        match self.insts[inst].block.expand() {
            Some(block) => block,
            None => panic!("`{inst}` is not inserted in the layout"),
        }
    }

    pub fn iter_block(&self) -> impl Iterator<Item = BlockId> + '_ {
        let mut next = self.entry_block.expand();
        std::iter::from_fn(move || {
            let block = next?;
            next = self.blocks[block].next.expand();
            Some(block)
        })
    }

    pub fn iter_inst(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        debug_assert!(self.is_block_inserted(block));
        let mut next = self.blocks[block].first_inst.expand();
        std::iter::from_fn(move || {
            let inst = next?;
            next = self.insts[inst].next.expand();
            Some(inst)
        })
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block));
        match self.last_block.expand() {
            Some(last) => self.insert_block_after(block, last),
            None => {
                self.blocks[block] = BlockNode::inserted();
                self.entry_block = block.into();
                self.last_block = block.into();
            }
        }
    }

    pub fn insert_block_after(&mut self, block: BlockId, after: BlockId) {
        debug_assert!(self.is_block_inserted(after));
        debug_assert!(!self.is_block_inserted(block));

        let next = self.blocks[after].next;
        self.blocks[block] = BlockNode {
            prev: after.into(),
            next,
            ..BlockNode::inserted()
        };
        self.blocks[after].next = block.into();
        match next.expand() {
            Some(next) => self.blocks[next].prev = block.into(),
            None => self.last_block = block.into(),
        }
    }

    pub fn insert_block_before(&mut self, block: BlockId, before: BlockId) {
        debug_assert!(self.is_block_inserted(before));
        debug_assert!(!self.is_block_inserted(block));

        let prev = self.blocks[before].prev;
        self.blocks[block] = BlockNode {
            prev,
            next: before.into(),
            ..BlockNode::inserted()
        };
        self.blocks[before].prev = block.into();
        match prev.expand() {
            Some(prev) => self.blocks[prev].next = block.into(),
            None => self.entry_block = block.into(),
        }
    }

    /// Unlinks an empty block.
    pub fn remove_block(&mut self, block: BlockId) {
        debug_assert!(self.is_block_empty(block));

        let BlockNode { prev, next, .. } = std::mem::take(&mut self.blocks[block]);
        match prev.expand() {
            Some(prev) => self.blocks[prev].next = next,
            None => self.entry_block = next,
        }
        match next.expand() {
            Some(next) => self.blocks[next].prev = prev,
            None => self.last_block = prev,
        }
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        match self.blocks[block].last_inst.expand() {
            Some(last) => self.insert_inst_after(inst, last),
            None => self.link_only_inst(inst, block),
        }
    }

    pub fn prepend_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        match self.blocks[block].first_inst.expand() {
            Some(first) => self.insert_inst_before(inst, first),
            None => self.link_only_inst(inst, block),
        }
    }

    pub fn insert_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(before);
        let prev = self.insts[before].prev;
        self.insts[inst] = InstNode {
            block: block.into(),
            prev,
            next: before.into(),
        };
        self.insts[before].prev = inst.into();
        match prev.expand() {
            Some(prev) => self.insts[prev].next = inst.into(),
            None => self.blocks[block].first_inst = inst.into(),
        }
    }

    pub fn insert_inst_after(&mut self, inst: InstId, after: InstId) {
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(after);
        let next = self.insts[after].next;
        self.insts[inst] = InstNode {
            block: block.into(),
            prev: after.into(),
            next,
        };
        self.insts[after].next = inst.into();
        match next.expand() {
            Some(next) => self.insts[next].prev = inst.into(),
            None => self.blocks[block].last_inst = inst.into(),
        }
    }

    /// Unlinks `inst` from its block. The instruction data is left untouched.
    pub fn remove_inst(&mut self, inst: InstId) {
        let block = self.inst_block(inst);
        let InstNode { prev, next, .. } = std::mem::take(&mut self.insts[inst]);
        match prev.expand() {
            Some(prev) => self.insts[prev].next = next,
            None => self.blocks[block].first_inst = next,
        }
        match next.expand() {
            Some(next) => self.insts[next].prev = prev,
            None => self.blocks[block].last_inst = prev,
        }
    }

    /// Moves `inst` and every instruction following it to the end of `dest`.
    pub fn split_block_at(&mut self, inst: InstId, dest: BlockId) {
        let src = self.inst_block(inst);
        debug_assert_ne!(src, dest);

        let mut next = Some(inst);
        while let Some(moved) = next {
            next = self.next_inst_of(moved);
            self.remove_inst(moved);
            self.append_inst(moved, dest);
        }
        debug_assert!(self.last_inst_of(src) != Some(inst));
    }

    fn link_only_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst));
        self.insts[inst] = InstNode {
            block: block.into(),
            ..InstNode::default()
        };
        let node = &mut self.blocks[block];
        node.first_inst = inst.into();
        node.last_inst = inst.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BlockNode {
    inserted: bool,
    prev: PackedOption<BlockId>,
    next: PackedOption<BlockId>,
    first_inst: PackedOption<InstId>,
    last_inst: PackedOption<InstId>,
}

impl BlockNode {
    fn inserted() -> Self {
        Self {
            inserted: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct InstNode {
    block: PackedOption<BlockId>,
    prev: PackedOption<InstId>,
    next: PackedOption<InstId>,
}
