use thiserror::Error;

use crate::VerificationReport;

#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    #[error("IR verification failed\n{0}")]
    Invalid(VerificationReport),
}

impl VerifyError {
    pub fn report(&self) -> &VerificationReport {
        match self {
            Self::Invalid(report) => report,
        }
    }
}
