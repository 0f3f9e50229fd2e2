//! Pattern-based graph rewriting.
//!
//! A [RewritePattern] either declines a candidate operation or commits a
//! rewrite through the [PatternRewriter] mutation handle. Patterns are
//! combined into a [PatternSet] and driven to fixpoint over a graph by the
//! [PatternRewriteWalker]. Every handle operation leaves the graph
//! satisfying the data-model invariants before returning, so the driver and
//! later patterns always observe a consistent graph.

mod rewriter;
mod walker;

pub use rewriter::PatternRewriter;
pub use walker::PatternRewriteWalker;
pub use walker::WalkConfig;

use crate::ir::OpName;
use crate::ir::Operation;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use tracing::debug;

/// Whether a rewrite changed the graph.
///
/// Declining to match is [RewriteResult::Unchanged] and is not an error;
/// pattern failures are reserved for contract violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewriteResult {
    Changed,
    Unchanged,
}

impl RewriteResult {
    pub fn is_changed(&self) -> bool {
        matches!(self, RewriteResult::Changed)
    }
}

/// A match-and-rewrite rule over one operation.
pub trait RewritePattern: Send + Sync {
    /// The name of the pattern; used for logging.
    fn name(&self) -> &'static str;
    /// Restrict the pattern to one operation kind.
    ///
    /// When set, candidates of any other kind are skipped without the
    /// pattern inspecting their operands.
    fn root_kind(&self) -> Option<OpName> {
        None
    }
    /// Inspect `op` and either commit a rewrite through `rewriter` and
    /// return [RewriteResult::Changed], or leave the graph untouched and
    /// return [RewriteResult::Unchanged].
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> Result<RewriteResult>;
}

/// How a [PatternSet] treats multiple applicable patterns at one operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Commit the first pattern that matches, then move on.
    #[default]
    FirstMatch,
    /// Retry the whole pattern list at the same operation until a full
    /// round declines or the operation is erased.
    Saturate,
}

/// An ordered list of patterns tried in list order.
#[derive(Default)]
pub struct PatternSet {
    patterns: Vec<Box<dyn RewritePattern>>,
    policy: MatchPolicy,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_policy(policy: MatchPolicy) -> Self {
        Self {
            patterns: vec![],
            policy,
        }
    }
    pub fn add(&mut self, pattern: Box<dyn RewritePattern>) {
        self.patterns.push(pattern);
    }
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
    /// Offer `op` to the patterns according to the match policy.
    pub(crate) fn apply(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> Result<RewriteResult> {
        match self.policy {
            MatchPolicy::FirstMatch => self.apply_once(op, rewriter),
            MatchPolicy::Saturate => {
                let mut changed = RewriteResult::Unchanged;
                while !rewriter.erased() {
                    match self.apply_once(op, rewriter)? {
                        RewriteResult::Changed => changed = RewriteResult::Changed,
                        RewriteResult::Unchanged => break,
                    }
                }
                Ok(changed)
            }
        }
    }
    fn apply_once(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> Result<RewriteResult> {
        let name = op.rd().name().clone();
        for pattern in self.patterns.iter() {
            if let Some(kind) = pattern.root_kind() {
                if kind != name {
                    continue;
                }
            }
            debug!("Matching '{}' with {}", name, pattern.name());
            match pattern.match_and_rewrite(op, rewriter)? {
                RewriteResult::Changed => {
                    debug!("--> '{}' changed by {}", name, pattern.name());
                    return Ok(RewriteResult::Changed);
                }
                RewriteResult::Unchanged => continue,
            }
        }
        Ok(RewriteResult::Unchanged)
    }
}
