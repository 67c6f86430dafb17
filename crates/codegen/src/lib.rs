pub mod lower;
pub mod optim;
pub mod pass;
pub mod pipeline;

pub use pass::{apply, apply_fn, InstPass};
pub use pipeline::{run_func_passes, Pass, Pipeline, PipelineParseError};
