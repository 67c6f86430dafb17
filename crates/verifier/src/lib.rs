//! Structural and SSA checks over cadenza IR.
//!
//! Problems are reported as data in a [`VerificationReport`]; the verifier
//! never panics on malformed input except through the `*_or_panic` helpers.
mod config;
mod diagnostic;
mod error;
mod report;
mod verify;

pub use config::{VerificationLevel, VerifierConfig};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Note, Severity};
pub use error::VerifyError;
pub use report::VerificationReport;
pub use verify::{
    verify_function, verify_function_or_panic, verify_module, verify_module_or_panic,
};

/// Fully verifies a function in debug builds, panicking with the report on
/// failure.
#[macro_export]
macro_rules! debug_verify_func {
    ($func:expr) => {{
        if cfg!(debug_assertions) {
            let cfg = $crate::VerifierConfig::for_level($crate::VerificationLevel::Full);
            $crate::verify_function_or_panic($func, &cfg);
        }
    }};
}
