//! Named transformation passes and the dispatch plumbing around them.
//!
//! A driver hands the library a list of pass flags (e.g. `--canonicalize`);
//! [transform] runs them in order over a graph. Embedders add their own
//! passes by implementing [PassDispatch].

use crate::canonicalize::canonicalize;
use crate::ir::Operation;
use crate::rewrite::RewriteResult;
use crate::schema::DialectRegistry;
use crate::shared::Shared;
use crate::verifier::Verifier;
use anyhow::Result;
use clap::Arg;
use clap::ArgAction;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;

/// A transformation that can be applied to a graph.
pub trait Pass {
    const NAME: &'static str;
    fn run(op: &Shared<Operation>, registry: &Arc<DialectRegistry>) -> Result<RewriteResult>;
}

/// Constant folding plus dead-value elimination, to fixpoint.
pub struct Canonicalize;

impl Pass for Canonicalize {
    const NAME: &'static str = "canonicalize";
    fn run(op: &Shared<Operation>, registry: &Arc<DialectRegistry>) -> Result<RewriteResult> {
        canonicalize(op, registry)
    }
}

/// Whole-graph verification as a pass; fails the pipeline on the first
/// violation and never changes the graph.
pub struct VerifyPass;

impl Pass for VerifyPass {
    const NAME: &'static str = "verify";
    fn run(op: &Shared<Operation>, registry: &Arc<DialectRegistry>) -> Result<RewriteResult> {
        Verifier::new(registry).verify(op)?;
        Ok(RewriteResult::Unchanged)
    }
}

/// A single pass flag (e.g. `--canonicalize`).
pub struct SinglePass {
    pass: String,
}

impl SinglePass {
    pub fn new(pass: &str) -> SinglePass {
        let pass = pass.trim_start_matches("--");
        SinglePass {
            pass: pass.to_string(),
        }
    }
    pub fn as_str(&self) -> &str {
        &self.pass
    }
}

impl Display for SinglePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pass)
    }
}

/// An ordered collection of [SinglePass]es.
pub struct Passes {
    passes: Vec<SinglePass>,
}

impl Passes {
    pub fn from_vec(passes: Vec<&str>) -> Passes {
        Passes {
            passes: passes.iter().map(|pass| SinglePass::new(pass)).collect(),
        }
    }
    /// Extract pass flags (arguments starting with `--`) from the given
    /// arguments, preserving order.
    pub fn from_flags(args: &[&str]) -> Passes {
        let passes = args
            .iter()
            .filter(|arg| arg.starts_with("--"))
            .map(|arg| SinglePass::new(arg))
            .collect();
        Passes { passes }
    }
    pub fn vec(&self) -> &Vec<SinglePass> {
        &self.passes
    }
}

impl Display for Passes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .passes
            .iter()
            .map(|pass| pass.to_string())
            .collect::<Vec<String>>()
            .join(" ");
        write!(f, "{joined}")
    }
}

/// Interface for drivers to add custom passes.
pub trait PassDispatch {
    fn dispatch(
        op: &Shared<Operation>,
        pass: &SinglePass,
        registry: &Arc<DialectRegistry>,
    ) -> Result<RewriteResult>;
}

/// Dispatch that knows only the passes implemented in this crate.
pub struct DefaultPassDispatch;

impl PassDispatch for DefaultPassDispatch {
    fn dispatch(
        op: &Shared<Operation>,
        pass: &SinglePass,
        registry: &Arc<DialectRegistry>,
    ) -> Result<RewriteResult> {
        match pass.as_str() {
            Canonicalize::NAME => Canonicalize::run(op, registry),
            VerifyPass::NAME => VerifyPass::run(op, registry),
            unknown => Err(anyhow::anyhow!("Unknown pass: {unknown}")),
        }
    }
}

/// Initialize logging with the given level.
pub fn init_subscriber(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_test_writer()
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

/// The pass arguments this crate understands, for embedding in a driver's
/// clap command.
pub fn default_arguments() -> Vec<Arg> {
    vec![
        Arg::new("canonicalize")
            .long("canonicalize")
            .help("Fold constants and drop dead values")
            .action(ArgAction::SetTrue),
        Arg::new("verify")
            .long("verify")
            .help("Verify the program and fail on the first violation")
            .action(ArgAction::SetTrue),
        Arg::new("print-ir-before-all")
            .long("print-ir-before-all")
            .help("Print the IR before each pass")
            .action(ArgAction::SetTrue),
    ]
}

/// Run the given passes over the graph in order.
pub fn transform<T: PassDispatch>(
    op: &Shared<Operation>,
    passes: &Passes,
    registry: &Arc<DialectRegistry>,
) -> Result<RewriteResult> {
    let mut result = RewriteResult::Unchanged;
    for pass in passes.vec() {
        let new_result = T::dispatch(op, pass, registry)?;
        if new_result.is_changed() {
            result = new_result;
        }
    }
    Ok(result)
}
