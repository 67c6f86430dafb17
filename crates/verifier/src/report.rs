use std::fmt;

use crate::{diagnostic::Diagnostic, VerifyError};

#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| !diag.is_error())
    }

    /// Turns a report with errors into an `Err`, so callers can use `?`.
    pub fn into_result(self) -> Result<(), VerifyError> {
        if self.has_errors() {
            Err(VerifyError::Invalid(self))
        } else {
            Ok(())
        }
    }

    /// Adds `diagnostic` unless the report already holds `max_diagnostics`
    /// entries. Zero means unlimited.
    pub(crate) fn push(&mut self, diagnostic: Diagnostic, max_diagnostics: usize) -> bool {
        if max_diagnostics != 0 && self.diagnostics.len() >= max_diagnostics {
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    pub(crate) fn extend_with_limit(&mut self, other: Vec<Diagnostic>, max_diagnostics: usize) {
        for diagnostic in other {
            if !self.push(diagnostic, max_diagnostics) {
                break;
            }
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return "verification succeeded".fmt(f);
        }

        for (index, diagnostic) in self.diagnostics.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
