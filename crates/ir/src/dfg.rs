//! This module contains the data flow graph of a function: instructions,
//! values, and the use lists connecting them.
use std::collections::BTreeSet;

use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    inst::{InstData, Opcode, Payload, Src},
    Immediate, InstId, Type, Value, ValueId,
};

#[derive(Debug, Clone, Default)]
pub struct DataFlowGraph {
    #[doc(hidden)]
    pub blocks: PrimaryMap<BlockId, Block>,
    values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, InstData>,
    inst_results: SecondaryMap<InstId, SmallVec<[ValueId; 2]>>,
    immediates: FxHashMap<Immediate, ValueId>,
    users: SecondaryMap<ValueId, BTreeSet<InstId>>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    pub fn make_arg_value(&mut self, ty: Type, idx: usize) -> ValueId {
        self.make_value(Value::Arg { idx, ty })
    }

    /// Returns the interned value of `imm`.
    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        let imm: Immediate = imm.into();
        if let Some(&value) = self.immediates.get(&imm) {
            return value;
        }

        let value = self.make_value(Value::Immediate { imm, ty: imm.ty() });
        self.immediates.insert(imm, value);
        value
    }

    /// Creates an instruction and registers it as a user of its sources.
    pub fn make_inst(&mut self, data: InstData) -> InstId {
        let inst = self.insts.push(data);
        self.track_inst(inst);
        inst
    }

    /// Creates one destination value per entry of `tys`.
    ///
    /// # Panics
    /// Panics if the count differs from the opcode's destination count or if
    /// the instruction already has results.
    pub fn make_results(&mut self, inst: InstId, tys: &[Type]) -> SmallVec<[ValueId; 2]> {
        let desc = self.insts[inst].desc();
        assert_eq!(
            desc.num_dests as usize,
            tys.len(),
            "`{}` defines {} values, {} types given",
            desc.name,
            desc.num_dests,
            tys.len()
        );
        assert!(self.inst_results[inst].is_empty(), "`{inst}` already has results");

        let results: SmallVec<[ValueId; 2]> = tys
            .iter()
            .enumerate()
            .map(|(slot, &ty)| {
                self.make_value(Value::Inst {
                    inst,
                    slot: slot as u8,
                    ty,
                })
            })
            .collect();
        self.inst_results[inst] = results.clone();
        results
    }

    pub fn inst(&self, inst: InstId) -> &InstData {
        &self.insts[inst]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn insts(&self) -> impl Iterator<Item = (InstId, &InstData)> {
        self.insts.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values.iter()
    }

    pub fn inst_results(&self, inst: InstId) -> &[ValueId] {
        &self.inst_results[inst]
    }

    /// Returns the first destination of `inst`.
    pub fn inst_result(&self, inst: InstId) -> Option<ValueId> {
        self.inst_results[inst].first().copied()
    }

    pub fn value(&self, value: ValueId) -> &Value {
        &self.values[value]
    }

    pub fn value_ty(&self, value: ValueId) -> Type {
        self.values[value].ty()
    }

    pub fn value_inst(&self, value: ValueId) -> Option<InstId> {
        self.values[value].defining_inst()
    }

    pub fn value_imm(&self, value: ValueId) -> Option<Immediate> {
        match self.values[value] {
            Value::Immediate { imm, .. } => Some(imm),
            _ => None,
        }
    }

    pub fn is_valid_value(&self, value: ValueId) -> bool {
        self.values.is_valid(value)
    }

    pub fn is_valid_inst(&self, inst: InstId) -> bool {
        self.insts.is_valid(inst)
    }

    /// Returns all instructions that use `value`.
    pub fn users(&self, value: ValueId) -> impl Iterator<Item = &InstId> {
        self.users[value].iter()
    }

    pub fn users_num(&self, value: ValueId) -> usize {
        self.users[value].len()
    }

    /// Returns `true` if any destination of `inst` is still read.
    pub fn has_live_results(&self, inst: InstId) -> bool {
        self.inst_results[inst]
            .iter()
            .any(|&result| !self.users[result].is_empty())
    }

    /// Replaces source `idx` of `inst`, keeping use lists current.
    pub fn rewrite_src(&mut self, inst: InstId, idx: usize, src: Src) {
        let old = std::mem::replace(&mut self.insts[inst].srcs[idx], src);
        if old.value != src.value {
            self.release_use(old.value, inst);
            self.users[src.value].insert(inst);
        }
    }

    /// Redirects every source reading `from` to read `to` instead, keeping the
    /// source modifiers.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        self.replace_uses_except(from, to, None);
    }

    /// Same as [`Self::replace_all_uses`], but leaves the sources of `except`
    /// untouched.
    pub fn replace_uses_except(&mut self, from: ValueId, to: ValueId, except: Option<InstId>) {
        if from == to {
            return;
        }

        let users = std::mem::take(&mut self.users[from]);
        for &user in &users {
            if Some(user) == except {
                self.users[from].insert(user);
                continue;
            }

            for src in self.insts[user].srcs.iter_mut() {
                if src.value == from {
                    *src = src.redirect(to);
                }
            }
            self.users[to].insert(user);
        }
    }

    /// Replaces the opcode of `inst`.
    ///
    /// # Panics
    /// Panics if the new opcode is not shape compatible with the sources and
    /// destinations `inst` already has.
    pub fn set_opcode(&mut self, inst: InstId, opcode: Opcode) {
        let data = &mut self.insts[inst];
        let desc = opcode.desc();
        assert!(
            desc.arity.accepts(data.srcs.len()) && desc.num_dests == data.desc().num_dests,
            "`{}` cannot be retagged as `{}`",
            data.opcode,
            desc.name
        );
        data.opcode = opcode;
    }

    pub fn payload_mut(&mut self, inst: InstId) -> &mut Payload {
        &mut self.insts[inst].payload
    }

    /// Adds an incoming `(value, block)` pair to a phi.
    pub fn append_phi_arg(&mut self, inst: InstId, value: ValueId, block: BlockId) {
        let data = &mut self.insts[inst];
        assert!(data.is_phi(), "`{inst}` is not a phi");
        data.srcs.push(Src::new(value));
        data.blocks.push(block);
        self.users[value].insert(inst);
    }

    /// Renames an incoming block of a phi, or a destination of a branch.
    pub fn rewrite_block_ref(&mut self, inst: InstId, from: BlockId, to: BlockId) {
        for block in self.insts[inst].blocks.iter_mut() {
            if *block == from {
                *block = to;
            }
        }
    }

    /// Removes `inst` from the use lists of its sources. Called when the
    /// instruction leaves the layout.
    pub fn untrack_inst(&mut self, inst: InstId) {
        let values: SmallVec<[ValueId; 4]> =
            self.insts[inst].srcs.iter().map(|src| src.value).collect();
        for value in values {
            self.users[value].remove(&inst);
        }
    }

    fn track_inst(&mut self, inst: InstId) {
        for src in &self.insts[inst].srcs {
            self.users[src.value].insert(inst);
        }
    }

    fn release_use(&mut self, value: ValueId, inst: InstId) {
        let still_used = self.insts[inst].srcs.iter().any(|src| src.value == value);
        if !still_used {
            self.users[value].remove(&inst);
        }
    }
}

/// An opaque reference to [`Block`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A block data definition.
/// Block contents and order are owned by [`crate::Layout`].
#[derive(Debug, Clone, Default)]
pub struct Block {}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }
}
