//! Pass sequencing.
//!
//! A [`Pipeline`] is an ordered list of per-function [`Pass`]es. Running it
//! on a module runs the whole list on every function, with functions
//! processed in parallel. The pipeline never reorders or repeats passes on
//! its own.
//!
//! Pipelines can be written as text: pass names separated by commas, with
//! options in parentheses separated by `|`, e.g.
//! `lower-image-derefs(bindless),guard-helper(stores),cse,dce`.
use std::{fmt, str::FromStr};

use cadenza_ir::{Function, Module};
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

use crate::{
    lower::{
        guard_helper_effects, lower_image_atomics, lower_image_derefs, lower_input_attachments,
        lower_shadow_compare, GuardHelperConfig, InputAttachmentConfig, LowerImageConfig,
    },
    optim::{run_dce, run_local_cse, run_specialize_select},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Pass {
    /// Block-local common subexpression elimination.
    Cse,
    /// Dead code elimination.
    Dce,
    LowerImageDerefs(LowerImageConfig),
    LowerInputAttachments(InputAttachmentConfig),
    LowerImageAtomics,
    LowerShadowCompare,
    /// Helper invocation guarding of memory side effects.
    GuardHelper(GuardHelperConfig),
    /// `bcsel` to `fcsel` specialization.
    SpecializeSelect,
}

impl Pass {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Runs the pass on `func` and returns `true` if it changed anything.
    pub fn run(self, func: &mut Function) -> bool {
        match self {
            Self::Cse => run_local_cse(func),
            Self::Dce => run_dce(func),
            Self::LowerImageDerefs(config) => lower_image_derefs(func, config),
            Self::LowerInputAttachments(config) => lower_input_attachments(func, config),
            Self::LowerImageAtomics => lower_image_atomics(func),
            Self::LowerShadowCompare => lower_shadow_compare(func),
            Self::GuardHelper(config) => guard_helper_effects(func, config),
            Self::SpecializeSelect => run_specialize_select(func),
        }
    }

    fn with_option(mut self, option: &str) -> Result<Self, PipelineParseError> {
        match (&mut self, option) {
            (Self::LowerImageDerefs(config), "bindless") => config.bindless_only = true,
            (Self::LowerInputAttachments(config), "layer") => config.use_layer_id = true,
            (Self::LowerInputAttachments(config), "view") => config.use_view_id = true,
            (Self::GuardHelper(config), "stores") => config.guard_stores_too = true,
            _ => {
                return Err(PipelineParseError::UnknownOption {
                    pass: self.name().to_string(),
                    option: option.to_string(),
                })
            }
        }
        Ok(self)
    }

    fn options(self) -> Vec<&'static str> {
        let mut options = Vec::new();
        match self {
            Self::LowerImageDerefs(config) if config.bindless_only => options.push("bindless"),
            Self::LowerInputAttachments(config) => {
                if config.use_layer_id {
                    options.push("layer");
                }
                if config.use_view_id {
                    options.push("view");
                }
            }
            Self::GuardHelper(config) if config.guard_stores_too => options.push("stores"),
            _ => {}
        }
        options
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        let options = self.options();
        if !options.is_empty() {
            write!(f, "({})", options.join("|"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineParseError {
    #[error("pipeline contains no pass")]
    Empty,

    #[error("unknown pass `{0}`")]
    UnknownPass(String),

    #[error("pass `{pass}` has no option `{option}`")]
    UnknownOption { pass: String, option: String },

    #[error("malformed pass `{0}`")]
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<Pass>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legalization for a backend without deref or image atomic support,
    /// followed by cleanup.
    pub fn legalize() -> Self {
        let mut pipeline = Self::new();
        pipeline
            .add_pass(Pass::LowerInputAttachments(InputAttachmentConfig::default()))
            .add_pass(Pass::LowerImageDerefs(LowerImageConfig::default()))
            .add_pass(Pass::LowerImageAtomics)
            .add_pass(Pass::LowerShadowCompare)
            .add_pass(Pass::GuardHelper(GuardHelperConfig::default()))
            .add_pass(Pass::Cse)
            .add_pass(Pass::SpecializeSelect)
            .add_pass(Pass::Dce);
        pipeline
    }

    pub fn add_pass(&mut self, pass: Pass) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Runs every pass on every function of `module`. Returns `true` if any
    /// function changed.
    pub fn run(&self, module: &mut Module) -> bool {
        let _span = tracing::debug_span!("pipeline", passes = %self).entered();
        module.par_any(|_, func| run_func_passes(&self.passes, func))
    }
}

/// Runs `passes` in order on a single function.
pub fn run_func_passes(passes: &[Pass], func: &mut Function) -> bool {
    passes
        .iter()
        .fold(false, |changed, pass| pass.run(func) || changed)
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut delim = "";
        for pass in &self.passes {
            write!(f, "{delim}{pass}")?;
            delim = ",";
        }
        Ok(())
    }
}

impl FromStr for Pipeline {
    type Err = PipelineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pipeline = Self::new();
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            pipeline.add_pass(parse_pass(item)?);
        }

        if pipeline.passes.is_empty() {
            return Err(PipelineParseError::Empty);
        }
        Ok(pipeline)
    }
}

fn parse_pass(item: &str) -> Result<Pass, PipelineParseError> {
    let (name, options) = match item.split_once('(') {
        Some((name, rest)) => {
            let options = rest
                .strip_suffix(')')
                .ok_or_else(|| PipelineParseError::Malformed(item.to_string()))?;
            (name.trim(), Some(options))
        }
        None => (item, None),
    };

    let mut pass =
        Pass::from_str(name).map_err(|_| PipelineParseError::UnknownPass(name.to_string()))?;
    for option in options.into_iter().flat_map(|options| options.split('|')) {
        let option = option.trim();
        if !option.is_empty() {
            pass = pass.with_option(option)?;
        }
    }
    Ok(pass)
}
