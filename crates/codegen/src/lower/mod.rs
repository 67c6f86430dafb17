//! Legalizing rewrites that run before instruction selection.
pub mod helper_guard;
pub mod image_atomic;
pub mod image_deref;
pub mod input_attachment;
pub mod shadow_compare;

pub use helper_guard::{guard_helper_effects, GuardHelperConfig};
pub use image_atomic::lower_image_atomics;
pub use image_deref::{lower_image_derefs, LowerImageConfig};
pub use input_attachment::{lower_input_attachments, InputAttachmentConfig};
pub use shadow_compare::lower_shadow_compare;
