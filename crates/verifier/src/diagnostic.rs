use std::fmt;

use cadenza_ir::{BlockId, InstId, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    MissingEntryBlock,
    EmptyBlock,
    MissingTerminator,
    TerminatorNotLast,
    BranchToNonInsertedBlock,
    UnreachableBlock,
    PhiNotAtBlockTop,
    PhiInEntryBlock,
    PhiArgCountMismatchPreds,
    PhiHasNonPredIncoming,
    PhiDuplicateIncomingBlock,
    PhiIncomingTypeMismatch,
    UseBeforeDefInBlock,
    DefDoesNotDominateUse,
    PhiIncomingNotAvailableOnEdge,
    UseOfDetachedValue,
    ArityMismatch,
    ResultCountMismatch,
    UsersSetMismatch,
    InstResultMapBroken,
    StaleMetadata,
}

impl DiagnosticCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::MissingEntryBlock => 100,
            Self::EmptyBlock => 200,
            Self::MissingTerminator => 201,
            Self::TerminatorNotLast => 202,
            Self::BranchToNonInsertedBlock => 300,
            Self::UnreachableBlock => 301,
            Self::PhiNotAtBlockTop => 400,
            Self::PhiInEntryBlock => 401,
            Self::PhiArgCountMismatchPreds => 402,
            Self::PhiHasNonPredIncoming => 403,
            Self::PhiDuplicateIncomingBlock => 404,
            Self::PhiIncomingTypeMismatch => 405,
            Self::UseBeforeDefInBlock => 500,
            Self::DefDoesNotDominateUse => 501,
            Self::PhiIncomingNotAvailableOnEdge => 502,
            Self::UseOfDetachedValue => 503,
            Self::ArityMismatch => 600,
            Self::ResultCountMismatch => 601,
            Self::UsersSetMismatch => 700,
            Self::InstResultMapBroken => 701,
            Self::StaleMetadata => 702,
        }
    }

    pub fn as_str(self) -> String {
        format!("IR{:04}", self.as_u16())
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => "error".fmt(f),
            Self::Warning => "warning".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Function,
    Block(BlockId),
    Inst {
        block: Option<BlockId>,
        inst: InstId,
    },
    Value(ValueId),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => "function".fmt(f),
            Self::Block(block) => block.fmt(f),
            Self::Inst {
                block: Some(block),
                inst,
            } => write!(f, "{block}:{inst}"),
            Self::Inst { block: None, inst } => inst.fmt(f),
            Self::Value(value) => value.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub primary: Location,
    /// Name of the function the diagnostic was raised in.
    pub function: Option<String>,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
        primary: Location,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            primary,
            function: None,
            notes: Vec::new(),
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Error, message, primary)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Warning, message, primary)
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            message: message.into(),
        });
        self
    }

    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} @ {}",
            self.severity, self.code, self.message, self.primary
        )?;
        if let Some(function) = &self.function {
            write!(f, " (%{function})")?;
        }
        writeln!(f)?;

        for note in &self.notes {
            writeln!(f, "  note: {}", note.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let diag = Diagnostic::error(
            DiagnosticCode::MissingTerminator,
            "block does not end with a terminator",
            Location::Block(BlockId(1)),
        )
        .with_function("main")
        .with_note("last instruction is `fadd`");

        assert_eq!(
            diag.to_string(),
            "error [IR0201] block does not end with a terminator @ block1 (%main)\n  note: last instruction is `fadd`\n"
        );
    }
}
