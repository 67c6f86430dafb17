//! A reference evaluator for cadenza IR.
//!
//! The [`Machine`] runs one function for a single fragment invocation and
//! records every memory side effect it performs, so two versions of a
//! function can be compared by their return values and their [`Event`]
//! logs.
mod alu;
mod frame;
mod machine;
mod state;
mod value;

pub use machine::Machine;
pub use state::{texel_address, Env, Event, Memory};
pub use value::EvalValue;
