//! Resource variables referenced by deref chains.
use std::fmt;

use cranelift_entity::entity_impl;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);
entity_impl!(VarId, "var");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum ImageDim {
    #[strum(serialize = "1d")]
    Dim1D,
    #[strum(serialize = "2d")]
    Dim2D,
    #[strum(serialize = "3d")]
    Dim3D,
    #[strum(serialize = "cube")]
    Cube,
    #[strum(serialize = "buf")]
    Buffer,
    /// A framebuffer attachment read at the current fragment position.
    #[strum(serialize = "subpass")]
    Subpass,
    #[strum(serialize = "subpass_ms")]
    SubpassMs,
}

impl ImageDim {
    pub fn is_subpass(self) -> bool {
        matches!(self, Self::Subpass | Self::SubpassMs)
    }
}

impl fmt::Display for ImageDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Unknown,
    R32Uint,
    R32Sint,
    R32Float,
    Rgba8Unorm,
    Rgba32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageVar {
    pub dim: ImageDim,
    pub arrayed: bool,
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Image(ImageVar),
    Buffer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarData {
    pub name: String,
    pub kind: VarKind,
    /// First binding slot. Arrays of resources occupy consecutive slots.
    pub binding: u32,
    /// The variable is reached through a bindless handle table.
    pub bindless: bool,
}

impl VarData {
    pub fn image(name: &str, binding: u32, image: ImageVar) -> Self {
        Self {
            name: name.to_string(),
            kind: VarKind::Image(image),
            binding,
            bindless: false,
        }
    }

    pub fn buffer(name: &str, binding: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: VarKind::Buffer,
            binding,
            bindless: false,
        }
    }

    pub fn with_bindless(mut self) -> Self {
        self.bindless = true;
        self
    }

    pub fn image_var(&self) -> Option<&ImageVar> {
        match &self.kind {
            VarKind::Image(image) => Some(image),
            VarKind::Buffer => None,
        }
    }

    pub fn image_var_mut(&mut self) -> Option<&mut ImageVar> {
        match &mut self.kind {
            VarKind::Image(image) => Some(image),
            VarKind::Buffer => None,
        }
    }
}
