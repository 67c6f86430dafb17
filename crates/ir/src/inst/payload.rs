//! Opcode-specific immediate data attached to an instruction.
use std::fmt;

use bitflags::bitflags;
use strum::IntoStaticStr;

use crate::{ImageDim, ImageFormat, VarId};

bitflags! {
    /// Memory access qualifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u8 {
        const COHERENT = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
        const NON_WRITEABLE = 1 << 3;
        /// The access may be moved or merged with an identical access.
        const CAN_REORDER = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AtomicOp {
    Add,
    Min,
    Max,
    And,
    Or,
    Xor,
    Xchg,
    CmpXchg,
}

impl AtomicOp {
    /// Number of data sources the operation consumes.
    pub fn num_data(self) -> usize {
        match self {
            Self::CmpXchg => 2,
            _ => 1,
        }
    }
}

/// How an image operation names its image in source 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ImageAddressing {
    /// Source 0 is a deref chain rooted at a variable.
    Deref,
    /// Source 0 is a binding index.
    Indexed,
    /// Source 0 is a bindless handle.
    Bindless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImagePayload {
    pub addressing: ImageAddressing,
    pub dim: ImageDim,
    pub arrayed: bool,
    pub format: ImageFormat,
    pub access: AccessFlags,
    pub atomic: Option<AtomicOp>,
}

impl ImagePayload {
    pub fn new(dim: ImageDim) -> Self {
        Self {
            addressing: ImageAddressing::Deref,
            dim,
            arrayed: false,
            format: ImageFormat::Unknown,
            access: AccessFlags::empty(),
            atomic: None,
        }
    }

    pub fn with_atomic(mut self, op: AtomicOp) -> Self {
        self.atomic = Some(op);
        self
    }

    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn with_addressing(mut self, addressing: ImageAddressing) -> Self {
        self.addressing = addressing;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexPayload {
    pub dim: ImageDim,
    pub arrayed: bool,
    /// Depth comparison against the reference in source 2.
    pub compare: Option<CompareFunc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Payload {
    #[default]
    None,
    Access(AccessFlags),
    Atomic { op: AtomicOp, access: AccessFlags },
    Image(ImagePayload),
    Deref(VarId),
    Tex(TexPayload),
}

impl Payload {
    pub fn access(&self) -> AccessFlags {
        match self {
            Self::Access(access) | Self::Atomic { access, .. } => *access,
            Self::Image(image) => image.access,
            _ => AccessFlags::empty(),
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn image_mut(&mut self) -> Option<&mut ImagePayload> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Access(access) => write_access(f, *access),
            Self::Atomic { op, access } => {
                let op: &'static str = op.into();
                write!(f, "{op}")?;
                write_access(f, *access)
            }
            Self::Image(image) => {
                let addressing: &'static str = image.addressing.into();
                write!(f, "{} {addressing}", image.dim)?;
                if image.arrayed {
                    write!(f, " array")?;
                }
                if image.format != ImageFormat::Unknown {
                    let format: &'static str = image.format.into();
                    write!(f, " {format}")?;
                }
                if let Some(op) = image.atomic {
                    let op: &'static str = op.into();
                    write!(f, " {op}")?;
                }
                write_access(f, image.access)
            }
            Self::Deref(var) => write!(f, "{var}"),
            Self::Tex(tex) => {
                write!(f, "{}", tex.dim)?;
                if tex.arrayed {
                    write!(f, " array")?;
                }
                if let Some(func) = tex.compare {
                    let func: &'static str = func.into();
                    write!(f, " cmp={func}")?;
                }
                Ok(())
            }
        }
    }
}

fn write_access(f: &mut fmt::Formatter<'_>, access: AccessFlags) -> fmt::Result {
    for (name, _) in access.iter_names() {
        write!(f, " {}", name.to_lowercase())?;
    }
    Ok(())
}
