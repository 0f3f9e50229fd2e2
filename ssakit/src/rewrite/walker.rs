use crate::ir::Operation;
use crate::rewrite::PatternRewriter;
use crate::rewrite::PatternSet;
use crate::rewrite::RewriteResult;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Traversal options for [PatternRewriteWalker].
#[derive(Clone, Copy, Debug, Default)]
pub struct WalkConfig {
    /// Rewrite the contents of an operation's regions before offering the
    /// operation itself (post-order) instead of after it (pre-order).
    pub regions_first: bool,
    /// Visit each block's operations tail to head.
    pub reverse: bool,
    /// Worklist-style fixpoint: operations inserted or modified by a
    /// committed rewrite are revisited before the walker advances.
    ///
    /// The walker imposes no iteration cap; termination is the pattern
    /// authors' contract and an always-applicable pattern will loop
    /// forever.
    pub recursive: bool,
}

/// Drives a [PatternSet] across a graph until no further visits are pending.
///
/// The walker visits each operation once in the configured order and offers
/// it to the pattern set. Operations erased mid-traversal are detected and
/// never re-offered. With [WalkConfig::recursive], every commit re-enqueues
/// the affected operations, implementing fixpoint iteration.
pub struct PatternRewriteWalker {
    patterns: PatternSet,
    config: WalkConfig,
}

impl PatternRewriteWalker {
    pub fn new(patterns: PatternSet) -> Self {
        Self {
            patterns,
            config: WalkConfig::default(),
        }
    }
    pub fn with_config(patterns: PatternSet, config: WalkConfig) -> Self {
        Self { patterns, config }
    }
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }
    /// Walk the graph rooted at `root`, applying patterns until quiescent.
    ///
    /// A pattern's contract violation aborts the walk with the error;
    /// "no pattern matched" is not an error.
    pub fn walk(&self, root: &Shared<Operation>) -> Result<RewriteResult> {
        let mut order = vec![];
        collect(root, &self.config, &mut order);
        let mut worklist: VecDeque<Shared<Operation>> = order.into();
        let mut changed_any = false;
        while let Some(op) = worklist.pop_front() {
            // An operation erased by an earlier rewrite has a severed parent
            // link somewhere on its path to the root; it must not be offered
            // again. This also covers operations nested inside an erased one.
            if !attached(&op, root) {
                continue;
            }
            let mut rewriter = PatternRewriter::new(op.clone());
            let result = self.patterns.apply(&op, &mut rewriter)?;
            if result.is_changed() {
                changed_any = true;
                if self.config.recursive {
                    let mut revisit = vec![];
                    for inserted in rewriter.inserted() {
                        collect(inserted, &self.config, &mut revisit);
                    }
                    for touched in rewriter.touched() {
                        revisit.push(touched.clone());
                    }
                    if !rewriter.erased() {
                        revisit.push(op.clone());
                    }
                    debug!("Revisiting {} operations", revisit.len());
                    for pending in revisit.into_iter().rev() {
                        worklist.push_front(pending);
                    }
                }
            }
        }
        Ok(if changed_any {
            RewriteResult::Changed
        } else {
            RewriteResult::Unchanged
        })
    }
}

/// Whether `op` is still reachable from `root` through parent links.
fn attached(op: &Shared<Operation>, root: &Shared<Operation>) -> bool {
    let mut current = op.clone();
    loop {
        if Arc::ptr_eq(&current, root) {
            return true;
        }
        let block = match current.rd().parent() {
            Some(block) => block,
            None => return false,
        };
        let region = match block.rd().parent() {
            Some(region) => region,
            None => return false,
        };
        let parent = match region.rd().parent() {
            Some(parent) => parent,
            None => return false,
        };
        current = parent;
    }
}

/// Flatten the subtree under `op` into `out` honoring the configured order.
fn collect(op: &Shared<Operation>, config: &WalkConfig, out: &mut Vec<Shared<Operation>>) {
    if config.regions_first {
        collect_nested(op, config, out);
        out.push(op.clone());
    } else {
        out.push(op.clone());
        collect_nested(op, config, out);
    }
}

fn collect_nested(op: &Shared<Operation>, config: &WalkConfig, out: &mut Vec<Shared<Operation>>) {
    for region in op.rd().regions() {
        for block in region.rd().blocks() {
            let mut ops = block.rd().ops();
            if config.reverse {
                ops.reverse();
            }
            for inner in ops {
                collect(&inner, config, out);
            }
        }
    }
}
