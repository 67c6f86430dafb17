//! Value types of the cadenza IR.
//!
//! A type is an element kind, a bit width and a lane count. Vector values are
//! homogeneous; there are no aggregate types.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemKind {
    Int,
    Float,
    /// Resource handles and other values without arithmetic meaning.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type {
    pub kind: ElemKind,
    pub bits: u8,
    pub lanes: u8,
}

impl Type {
    pub const I1: Self = Self::scalar(ElemKind::Int, 1);
    pub const I8: Self = Self::scalar(ElemKind::Int, 8);
    pub const I16: Self = Self::scalar(ElemKind::Int, 16);
    pub const I32: Self = Self::scalar(ElemKind::Int, 32);
    pub const I64: Self = Self::scalar(ElemKind::Int, 64);
    pub const F16: Self = Self::scalar(ElemKind::Float, 16);
    pub const F32: Self = Self::scalar(ElemKind::Float, 32);
    pub const F64: Self = Self::scalar(ElemKind::Float, 64);
    pub const HANDLE: Self = Self::scalar(ElemKind::Opaque, 32);

    pub const fn scalar(kind: ElemKind, bits: u8) -> Self {
        Self {
            kind,
            bits,
            lanes: 1,
        }
    }

    /// Returns the vector type with `lanes` elements of `self`.
    pub const fn vec(self, lanes: u8) -> Self {
        Self {
            kind: self.kind,
            bits: self.bits,
            lanes,
        }
    }

    /// Returns the element type of a vector, or `self` for scalars.
    pub const fn elem(self) -> Self {
        self.vec(1)
    }

    pub fn is_float(self) -> bool {
        self.kind == ElemKind::Float
    }

    pub fn is_integral(self) -> bool {
        self.kind == ElemKind::Int
    }

    pub fn is_bool(self) -> bool {
        self.is_integral() && self.bits == 1
    }

    pub fn is_vector(self) -> bool {
        self.lanes > 1
    }

    /// Returns the width of a whole value in bits.
    pub fn size_in_bits(self) -> u32 {
        self.bits as u32 * self.lanes as u32
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ElemKind::Int => write!(f, "i{}", self.bits)?,
            ElemKind::Float => write!(f, "f{}", self.bits)?,
            ElemKind::Opaque => write!(f, "handle")?,
        }

        if self.is_vector() {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}
