//! Stock cleanup patterns: constant folding and dead-value elimination.

use crate::dialect::arith;
use crate::ir::Attribute;
use crate::ir::IntegerAttr;
use crate::ir::OpName;
use crate::ir::Operation;
use crate::rewrite::PatternRewriteWalker;
use crate::rewrite::PatternRewriter;
use crate::rewrite::PatternSet;
use crate::rewrite::RewritePattern;
use crate::rewrite::RewriteResult;
use crate::rewrite::WalkConfig;
use crate::schema::DialectRegistry;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::sync::Arc;

/// Fold `addi(constant, constant)` into a single constant.
pub struct FoldAddi;

impl FoldAddi {
    fn constant_operand(operation: &Shared<Operation>, index: usize) -> Option<IntegerAttr> {
        let operand = operation.rd().operand(index)?;
        let producer = operand.rd().defining_op()?;
        if !producer.rd().name().is(arith::CONSTANT) {
            return None;
        }
        let guard = producer.rd();
        guard.attribute("value").and_then(Attribute::as_integer).cloned()
    }
}

impl RewritePattern for FoldAddi {
    fn name(&self) -> &'static str {
        "canonicalize::FoldAddi"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new(arith::ADDI))
    }
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> Result<RewriteResult> {
        let lhs = match Self::constant_operand(op, 0) {
            Some(lhs) => lhs,
            None => return Ok(RewriteResult::Unchanged),
        };
        let rhs = match Self::constant_operand(op, 1) {
            Some(rhs) => rhs,
            None => return Ok(RewriteResult::Unchanged),
        };
        let typ = op.rd().result_types().remove(0);
        let folded = arith::constant(lhs.value().wrapping_add(rhs.value()), typ);
        rewriter.replace_with_ops(vec![folded])?;
        Ok(RewriteResult::Changed)
    }
}

/// Erase side-effect-free operations none of whose results are used.
pub struct DeadValueElimination {
    registry: Arc<DialectRegistry>,
}

impl DeadValueElimination {
    pub fn new(registry: Arc<DialectRegistry>) -> Self {
        Self { registry }
    }
}

impl RewritePattern for DeadValueElimination {
    fn name(&self) -> &'static str {
        "canonicalize::DeadValueElimination"
    }
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> Result<RewriteResult> {
        {
            let guard = op.rd();
            let schema = match self.registry.get(guard.name()) {
                Some(schema) => schema,
                None => return Ok(RewriteResult::Unchanged),
            };
            if !schema.is_pure() {
                return Ok(RewriteResult::Unchanged);
            }
            let results = guard.results();
            if results.is_empty() {
                return Ok(RewriteResult::Unchanged);
            }
            if results.iter().any(|result| result.rd().is_used()) {
                return Ok(RewriteResult::Unchanged);
            }
        }
        rewriter.erase()?;
        Ok(RewriteResult::Changed)
    }
}

/// Apply the stock patterns to fixpoint over the graph rooted at `op`.
pub fn canonicalize(
    op: &Shared<Operation>,
    registry: &Arc<DialectRegistry>,
) -> Result<RewriteResult> {
    let mut patterns = PatternSet::new();
    patterns.add(Box::new(FoldAddi));
    patterns.add(Box::new(DeadValueElimination::new(registry.clone())));
    let config = WalkConfig {
        regions_first: true,
        reverse: false,
        recursive: true,
    };
    PatternRewriteWalker::with_config(patterns, config).walk(op)
}
