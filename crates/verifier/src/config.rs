#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    /// Layout and terminator structure only.
    Fast,
    /// Adds operand arity and phi rules.
    Standard,
    /// Adds use lists, SSA dominance and cached metadata.
    Full,
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub level: VerificationLevel,
    pub max_diagnostics: usize,
    pub allow_unreachable_blocks: bool,
    pub check_arity: bool,
    pub check_phis: bool,
    pub check_users: bool,
    pub check_dominance: bool,
    pub check_metadata: bool,
}

impl VerifierConfig {
    pub fn for_level(level: VerificationLevel) -> Self {
        match level {
            VerificationLevel::Fast => Self {
                level,
                max_diagnostics: 200,
                allow_unreachable_blocks: true,
                check_arity: false,
                check_phis: false,
                check_users: false,
                check_dominance: false,
                check_metadata: false,
            },
            VerificationLevel::Standard => Self {
                level,
                max_diagnostics: 200,
                allow_unreachable_blocks: true,
                check_arity: true,
                check_phis: true,
                check_users: false,
                check_dominance: false,
                check_metadata: false,
            },
            VerificationLevel::Full => Self {
                level,
                max_diagnostics: 500,
                allow_unreachable_blocks: true,
                check_arity: true,
                check_phis: true,
                check_users: true,
                check_dominance: true,
                check_metadata: true,
            },
        }
    }

    pub fn should_check_arity(&self) -> bool {
        self.check_arity || !matches!(self.level, VerificationLevel::Fast)
    }

    pub fn should_check_phis(&self) -> bool {
        self.check_phis || !matches!(self.level, VerificationLevel::Fast)
    }

    pub fn should_check_users(&self) -> bool {
        self.check_users || matches!(self.level, VerificationLevel::Full)
    }

    pub fn should_check_dominance(&self) -> bool {
        self.check_dominance || matches!(self.level, VerificationLevel::Full)
    }

    pub fn should_check_metadata(&self) -> bool {
        self.check_metadata || matches!(self.level, VerificationLevel::Full)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::for_level(VerificationLevel::Standard)
    }
}
