pub mod dce;
pub mod local_cse;
pub mod specialize_select;
pub mod type_classes;

pub use dce::run_dce;
pub use local_cse::run_local_cse;
pub use specialize_select::run_specialize_select;
pub use type_classes::{gather_types, TypeClasses, ValueSet};
