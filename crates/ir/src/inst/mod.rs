//! Instructions of the cadenza IR.
//!
//! An instruction is an [`Opcode`], a list of [`Src`] operands, an optional
//! [`Payload`] and, for phis and branches, a list of blocks. Results live in
//! the [`DataFlowGraph`](crate::DataFlowGraph).
use cranelift_entity::entity_impl;
use smallvec::{smallvec, SmallVec};

use crate::{BlockId, ValueId};

pub mod opcode;
pub mod payload;

pub use opcode::{AluOp, Arity, Intrinsic, Opcode, OpcodeDesc, TyClass};
pub use payload::{
    AccessFlags, AtomicOp, CompareFunc, ImageAddressing, ImagePayload, Payload, TexPayload,
};

/// An opaque reference to [`InstData`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
entity_impl!(InstId, "inst");

/// Modifier applied to a source value when it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcMod {
    #[default]
    None,
    Neg,
    Abs,
    NegAbs,
    Not,
}

/// A non-owning reference to a value read by an instruction.
///
/// Two sources are equal when they name the same value with the same
/// modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Src {
    pub value: ValueId,
    pub modifier: SrcMod,
}

impl Src {
    pub fn new(value: ValueId) -> Self {
        Self {
            value,
            modifier: SrcMod::None,
        }
    }

    pub fn with_mod(value: ValueId, modifier: SrcMod) -> Self {
        Self { value, modifier }
    }

    /// Returns a source reading `value` with the same modifier as `self`.
    pub fn redirect(self, value: ValueId) -> Self {
        Self { value, ..self }
    }
}

impl From<ValueId> for Src {
    fn from(value: ValueId) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstData {
    pub opcode: Opcode,
    pub srcs: SmallVec<[Src; 4]>,
    pub payload: Payload,
    /// Branch destinations, or the incoming block of each phi source.
    pub blocks: SmallVec<[BlockId; 2]>,
}

impl InstData {
    pub fn new(opcode: impl Into<Opcode>, srcs: &[Src]) -> Self {
        Self {
            opcode: opcode.into(),
            srcs: srcs.into(),
            payload: Payload::None,
            blocks: SmallVec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn alu(op: AluOp, args: &[ValueId]) -> Self {
        let srcs: SmallVec<[Src; 4]> = args.iter().copied().map(Src::new).collect();
        Self::new(op, &srcs)
    }

    pub fn intrinsic(intr: Intrinsic, args: &[ValueId], payload: Payload) -> Self {
        let srcs: SmallVec<[Src; 4]> = args.iter().copied().map(Src::new).collect();
        Self::new(intr, &srcs).with_payload(payload)
    }

    pub fn phi(incoming: &[(ValueId, BlockId)]) -> Self {
        Self {
            opcode: Opcode::Phi,
            srcs: incoming.iter().map(|(value, _)| Src::new(*value)).collect(),
            payload: Payload::None,
            blocks: incoming.iter().map(|(_, block)| *block).collect(),
        }
    }

    pub fn jump(dest: BlockId) -> Self {
        Self {
            opcode: Opcode::Jump,
            srcs: SmallVec::new(),
            payload: Payload::None,
            blocks: smallvec![dest],
        }
    }

    pub fn br(cond: ValueId, then: BlockId, else_: BlockId) -> Self {
        Self {
            opcode: Opcode::Br,
            srcs: smallvec![Src::new(cond)],
            payload: Payload::None,
            blocks: smallvec![then, else_],
        }
    }

    pub fn ret(values: &[ValueId]) -> Self {
        Self::from_values(Opcode::Return, values)
    }

    fn from_values(opcode: Opcode, values: &[ValueId]) -> Self {
        Self {
            opcode,
            srcs: values.iter().copied().map(Src::new).collect(),
            payload: Payload::None,
            blocks: SmallVec::new(),
        }
    }

    pub fn desc(&self) -> &'static OpcodeDesc {
        self.opcode.desc()
    }

    pub fn can_eliminate(&self) -> bool {
        self.desc().can_eliminate
    }

    /// Returns `true` if the instruction may be moved or merged.
    ///
    /// Memory reads are reorderable only when their access flags allow it.
    pub fn can_reorder(&self) -> bool {
        match self.opcode {
            Opcode::Intrinsic(Intrinsic::Load | Intrinsic::ImageLoad) => {
                self.payload.access().contains(AccessFlags::CAN_REORDER)
            }
            opcode => opcode.desc().can_reorder,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    pub fn is_phi(&self) -> bool {
        self.opcode == Opcode::Phi
    }

    pub fn is_intrinsic(&self, intr: Intrinsic) -> bool {
        self.opcode == Opcode::Intrinsic(intr)
    }

    pub fn is_alu(&self, op: AluOp) -> bool {
        self.opcode == Opcode::Alu(op)
    }

    /// Returns the successors named by a terminator.
    pub fn branch_dests(&self) -> &[BlockId] {
        match self.opcode {
            Opcode::Jump | Opcode::Br => &self.blocks,
            _ => &[],
        }
    }

    /// Returns the incoming `(value, block)` pairs of a phi.
    pub fn phi_incoming(&self) -> impl Iterator<Item = (Src, BlockId)> + '_ {
        debug_assert!(self.is_phi());
        self.srcs.iter().copied().zip(self.blocks.iter().copied())
    }

    pub fn src(&self, idx: usize) -> Src {
        self.srcs[idx]
    }
}
