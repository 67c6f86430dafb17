//! This module contains the SSA value definitions.
use std::fmt;

use cranelift_entity::entity_impl;

use crate::{InstId, Type};

/// An opaque reference to [`Value`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);
entity_impl!(ValueId, "v");

/// A value definition.
///
/// Every value is defined exactly once: by a destination slot of an
/// instruction, by a function parameter, or as an interned immediate.
/// Parameters and immediates are available from the function entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// The value is the `slot`-th destination of `inst`.
    Inst { inst: InstId, slot: u8, ty: Type },

    /// The value is a function parameter.
    Arg { idx: usize, ty: Type },

    /// The value is an immediate.
    Immediate { imm: Immediate, ty: Type },
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Self::Inst { ty, .. } | Self::Arg { ty, .. } | Self::Immediate { ty, .. } => *ty,
        }
    }

    pub fn defining_inst(&self) -> Option<InstId> {
        match self {
            Self::Inst { inst, .. } => Some(*inst),
            _ => None,
        }
    }
}

/// Scalar constants.
///
/// Floats are held as their bit pattern so that the immediate can be hashed
/// and interned; `-0.0` and `0.0` are distinct immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    I1(bool),
    I32(i32),
    I64(i64),
    F32(u32),
}

impl Immediate {
    pub fn f32(value: f32) -> Self {
        Self::F32(value.to_bits())
    }

    pub fn ty(self) -> Type {
        match self {
            Self::I1(_) => Type::I1,
            Self::I32(_) => Type::I32,
            Self::I64(_) => Type::I64,
            Self::F32(_) => Type::F32,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::I1(b) => Some(b as i64),
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::F32(_) => None,
        }
    }

    pub fn as_f32(self) -> Option<f32> {
        match self {
            Self::F32(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }
}

impl From<bool> for Immediate {
    fn from(b: bool) -> Self {
        Self::I1(b)
    }
}

impl From<i32> for Immediate {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Immediate {
    fn from(v: u32) -> Self {
        Self::I32(v as i32)
    }
}

impl From<i64> for Immediate {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Immediate {
    fn from(v: f32) -> Self {
        Self::f32(v)
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I1(b) => write!(f, "{b}"),
            Self::I32(v) => write!(f, "{v}.i32"),
            Self::I64(v) => write!(f, "{v}.i64"),
            Self::F32(bits) => write!(f, "{:?}.f32", f32::from_bits(*bits)),
        }
    }
}
