//! Opcodes and their capability descriptors.
//!
//! Every property a pass needs to decide eligibility (side effects,
//! reorderability, arity, destination count) is read from a single
//! [`OpcodeDesc`] table. Passes never re-derive these facts from the opcode
//! themselves.
use std::fmt;

use strum::{EnumCount, EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AluOp {
    Fadd,
    Fsub,
    Fmul,
    Fneg,
    Fabs,
    Iadd,
    Isub,
    Imul,
    Iand,
    Ior,
    Ixor,
    Inot,
    Ieq,
    Ine,
    Ilt,
    Flt,
    Fge,
    Feq,
    Fne,
    /// Type-agnostic select: `bcsel cond a b`.
    Bcsel,
    /// Float select, produced by specializing [`AluOp::Bcsel`].
    Fcsel,
    Mov,
    F2i,
    I2f,
    B2f,
    /// Concatenates its sources into a vector.
    Vec,
    /// Splits a 64-bit integer into its low and high halves.
    Split,
    Undef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Intrinsic {
    FragCoord,
    LayerId,
    ViewId,
    IsHelper,
    Load,
    Store,
    GlobalAtomic,
    ImageLoad,
    ImageStore,
    ImageAtomic,
    ImageTexelAddress,
    DerefVar,
    DerefArray,
    BindlessHandle,
    Tex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Alu(AluOp),
    Intrinsic(Intrinsic),
    Phi,
    Jump,
    Br,
    Return,
}

impl Opcode {
    pub fn desc(self) -> &'static OpcodeDesc {
        match self {
            Self::Alu(op) => &ALU_DESCS[op as usize],
            Self::Intrinsic(intr) => &INTRINSIC_DESCS[intr as usize],
            Self::Phi => &PHI_DESC,
            Self::Jump => &JUMP_DESC,
            Self::Br => &BR_DESC,
            Self::Return => &RETURN_DESC,
        }
    }

    pub fn name(self) -> &'static str {
        self.desc().name
    }

    pub fn is_terminator(self) -> bool {
        self.desc().is_terminator
    }
}

impl From<AluOp> for Opcode {
    fn from(op: AluOp) -> Self {
        Self::Alu(op)
    }
}

impl From<Intrinsic> for Opcode {
    fn from(intr: Intrinsic) -> Self {
        Self::Intrinsic(intr)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(u8),
    Variable { min: u8 },
}

impl Arity {
    pub fn min(self) -> usize {
        match self {
            Self::Fixed(n) | Self::Variable { min: n } => n as usize,
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(self, Self::Variable { .. })
    }

    pub fn accepts(self, num: usize) -> bool {
        match self {
            Self::Fixed(n) => num == n as usize,
            Self::Variable { min } => num >= min as usize,
        }
    }
}

/// Type class of an opcode's data operands or destinations, consumed by type
/// inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TyClass {
    /// Nothing is implied.
    Any,
    Int,
    Float,
    Bool,
    /// Operands and destinations share one type, whatever it is.
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDesc {
    pub name: &'static str,
    pub arity: Arity,
    pub num_dests: u8,
    /// The instruction has no side effect and may be deleted once unused.
    pub can_eliminate: bool,
    /// The result does not depend on where the instruction executes.
    pub can_reorder: bool,
    pub is_terminator: bool,
    /// Index of the first source that `input` applies to.
    pub data_start: u8,
    pub input: TyClass,
    pub output: TyClass,
}

impl OpcodeDesc {
    pub const fn has_dest(&self) -> bool {
        self.num_dests > 0
    }
}

const fn pure(name: &'static str, arity: u8, input: TyClass, output: TyClass) -> OpcodeDesc {
    OpcodeDesc {
        name,
        arity: Arity::Fixed(arity),
        num_dests: 1,
        can_eliminate: true,
        can_reorder: true,
        is_terminator: false,
        data_start: 0,
        input,
        output,
    }
}

const fn effect(name: &'static str, arity: Arity, num_dests: u8, output: TyClass) -> OpcodeDesc {
    OpcodeDesc {
        name,
        arity,
        num_dests,
        can_eliminate: false,
        can_reorder: false,
        is_terminator: false,
        data_start: 0,
        input: TyClass::Any,
        output,
    }
}

const fn select(name: &'static str, data: TyClass, output: TyClass) -> OpcodeDesc {
    OpcodeDesc {
        data_start: 1,
        ..pure(name, 3, data, output)
    }
}

const fn terminator(name: &'static str, arity: Arity) -> OpcodeDesc {
    OpcodeDesc {
        is_terminator: true,
        ..effect(name, arity, 0, TyClass::Any)
    }
}

use TyClass::{Any, Bool, Float, Generic, Int};

static ALU_DESCS: [OpcodeDesc; AluOp::COUNT] = [
    pure("fadd", 2, Float, Float),
    pure("fsub", 2, Float, Float),
    pure("fmul", 2, Float, Float),
    pure("fneg", 1, Float, Float),
    pure("fabs", 1, Float, Float),
    pure("iadd", 2, Int, Int),
    pure("isub", 2, Int, Int),
    pure("imul", 2, Int, Int),
    pure("iand", 2, Int, Int),
    pure("ior", 2, Int, Int),
    pure("ixor", 2, Int, Int),
    pure("inot", 1, Int, Int),
    pure("ieq", 2, Int, Bool),
    pure("ine", 2, Int, Bool),
    pure("ilt", 2, Int, Bool),
    pure("flt", 2, Float, Bool),
    pure("fge", 2, Float, Bool),
    pure("feq", 2, Float, Bool),
    pure("fne", 2, Float, Bool),
    select("bcsel", Generic, Generic),
    select("fcsel", Float, Float),
    pure("mov", 1, Generic, Generic),
    pure("f2i", 1, Float, Int),
    pure("i2f", 1, Int, Float),
    pure("b2f", 1, Bool, Float),
    OpcodeDesc {
        arity: Arity::Variable { min: 1 },
        ..pure("vec", 1, Generic, Generic)
    },
    OpcodeDesc {
        num_dests: 2,
        ..pure("split", 1, Int, Int)
    },
    pure("undef", 0, Any, Any),
];

static INTRINSIC_DESCS: [OpcodeDesc; Intrinsic::COUNT] = [
    pure("frag_coord", 0, Any, Float),
    pure("layer_id", 0, Any, Int),
    pure("view_id", 0, Any, Int),
    // Helper status can change at a demote, so it must stay in place.
    OpcodeDesc {
        can_reorder: false,
        ..pure("is_helper", 0, Any, Bool)
    },
    OpcodeDesc {
        can_eliminate: true,
        ..effect("load", Arity::Fixed(1), 1, Any)
    },
    effect("store", Arity::Fixed(2), 0, Any),
    effect("global_atomic", Arity::Variable { min: 2 }, 1, Int),
    OpcodeDesc {
        can_eliminate: true,
        ..effect("image_load", Arity::Fixed(3), 1, Any)
    },
    effect("image_store", Arity::Fixed(4), 0, Any),
    effect("image_atomic", Arity::Variable { min: 4 }, 1, Int),
    pure("image_texel_address", 3, Any, Int),
    pure("deref_var", 0, Any, Any),
    pure("deref_array", 2, Any, Any),
    pure("bindless_handle", 1, Int, Any),
    OpcodeDesc {
        arity: Arity::Variable { min: 2 },
        ..pure("tex", 2, Any, Float)
    },
];

static PHI_DESC: OpcodeDesc = OpcodeDesc {
    arity: Arity::Variable { min: 1 },
    can_reorder: false,
    ..pure("phi", 1, Generic, Generic)
};
static JUMP_DESC: OpcodeDesc = terminator("jump", Arity::Fixed(0));
static BR_DESC: OpcodeDesc = terminator("br", Arity::Fixed(1));
static RETURN_DESC: OpcodeDesc = terminator("return", Arity::Variable { min: 0 });
