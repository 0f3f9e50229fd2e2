extern crate ssakit;

use parking_lot::Mutex;
use ssakit::ir::BlockExt;
use ssakit::ir::ModuleOp;
use ssakit::ir::OpName;
use ssakit::ir::Operation;
use ssakit::ir::OperationBuilder;
use ssakit::ir::Region;
use ssakit::ir::RegionExt;
use ssakit::ir::Type;
use ssakit::ir::Use;
use ssakit::ir::Value;
use ssakit::rewrite::MatchPolicy;
use ssakit::rewrite::PatternRewriteWalker;
use ssakit::rewrite::PatternRewriter;
use ssakit::rewrite::PatternSet;
use ssakit::rewrite::RewritePattern;
use ssakit::rewrite::RewriteResult;
use ssakit::rewrite::WalkConfig;
use ssakit::shared::Shared;
use ssakit::shared::SharedExt;
use ssakit::IrError;
use std::sync::Arc;

/// Records every operation kind it is offered, in order, and never matches.
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RewritePattern for Recorder {
    fn name(&self) -> &'static str {
        "test::Recorder"
    }
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        _rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        self.seen.lock().push(op.rd().name().to_string());
        Ok(RewriteResult::Unchanged)
    }
}

/// A module whose body is: test.a, test.outer { test.inner1, test.inner2 },
/// test.b.
fn nested_module() -> ModuleOp {
    let module = ModuleOp::new();
    let body = module.body();
    body.push_op(OperationBuilder::new("test.a").build());
    let region: Shared<Region> = Shared::new(Region::new().into());
    let block = region.add_block();
    block.push_op(OperationBuilder::new("test.inner1").build());
    block.push_op(OperationBuilder::new("test.inner2").build());
    body.push_op(OperationBuilder::new("test.outer").region(region).build());
    body.push_op(OperationBuilder::new("test.b").build());
    module
}

fn record_walk(config: WalkConfig) -> Vec<String> {
    let module = nested_module();
    let seen = Arc::new(Mutex::new(vec![]));
    let mut patterns = PatternSet::new();
    patterns.add(Box::new(Recorder { seen: seen.clone() }));
    let walker = PatternRewriteWalker::with_config(patterns, config);
    let result = walker.walk(module.operation()).unwrap();
    assert_eq!(result, RewriteResult::Unchanged);
    let seen = seen.lock().clone();
    seen
}

#[test]
fn preorder_offers_owners_first() {
    let seen = record_walk(WalkConfig::default());
    assert_eq!(
        seen,
        vec![
            "builtin.module",
            "test.a",
            "test.outer",
            "test.inner1",
            "test.inner2",
            "test.b",
        ]
    );
}

#[test]
fn regions_first_offers_contents_first() {
    let seen = record_walk(WalkConfig {
        regions_first: true,
        ..WalkConfig::default()
    });
    assert_eq!(
        seen,
        vec![
            "test.a",
            "test.inner1",
            "test.inner2",
            "test.outer",
            "test.b",
            "builtin.module",
        ]
    );
}

#[test]
fn reverse_visits_tail_to_head() {
    let seen = record_walk(WalkConfig {
        reverse: true,
        ..WalkConfig::default()
    });
    assert_eq!(
        seen,
        vec![
            "builtin.module",
            "test.b",
            "test.outer",
            "test.inner2",
            "test.inner1",
            "test.a",
        ]
    );
}

/// Replaces `test.def` with a fresh `test.newdef` carrying the same result
/// type.
struct ReplaceDef;

impl RewritePattern for ReplaceDef {
    fn name(&self) -> &'static str {
        "test::ReplaceDef"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new("test.def"))
    }
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        let types = op.rd().result_types();
        let new_op = OperationBuilder::new("test.newdef").results(types).build();
        rewriter.replace_with_ops(vec![new_op])?;
        Ok(RewriteResult::Changed)
    }
}

#[test]
fn replace_rewires_all_consumers_in_order() {
    let module = ModuleOp::new();
    let body = module.body();
    let def = OperationBuilder::new("test.def")
        .result(Type::Integer(8))
        .build();
    let other = OperationBuilder::new("test.other")
        .result(Type::Integer(8))
        .build();
    body.push_op(def.clone());
    body.push_op(other.clone());
    let old_result = def.rd().result(0).unwrap();
    let other_result = other.rd().result(0).unwrap();
    let user = OperationBuilder::new("test.use")
        .operand(&other_result)
        .operand(&old_result)
        .build();
    body.push_op(user.clone());

    let mut patterns = PatternSet::new();
    patterns.add(Box::new(ReplaceDef));
    let walker = PatternRewriteWalker::new(patterns);
    let result = walker.walk(module.operation()).unwrap();
    assert_eq!(result, RewriteResult::Changed);

    // The old result has no uses left and the consumer's operand order is
    // intact.
    assert!(!old_result.rd().is_used());
    let ops = body.rd().ops();
    assert_eq!(ops.len(), 3);
    assert!(ops[0].rd().name().is("test.newdef"));
    let new_result = ops[0].rd().result(0).unwrap();
    assert!(Arc::ptr_eq(&user.rd().operand(0).unwrap(), &other_result));
    assert!(Arc::ptr_eq(&user.rd().operand(1).unwrap(), &new_result));
    assert_eq!(new_result.rd().uses().len(), 1);
    assert_use_lists_exact(module.operation());
}

/// Erases its root even though the result is still used.
struct BadErase;

impl RewritePattern for BadErase {
    fn name(&self) -> &'static str {
        "test::BadErase"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new("test.def"))
    }
    fn match_and_rewrite(
        &self,
        _op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        rewriter.erase()?;
        Ok(RewriteResult::Changed)
    }
}

#[test]
fn erasing_a_used_operation_is_fatal() {
    let module = ModuleOp::new();
    let body = module.body();
    let def = OperationBuilder::new("test.def")
        .result(Type::Integer(8))
        .build();
    body.push_op(def.clone());
    let user = OperationBuilder::new("test.use")
        .operand(&def.rd().result(0).unwrap())
        .build();
    body.push_op(user);

    let mut patterns = PatternSet::new();
    patterns.add(Box::new(BadErase));
    let walker = PatternRewriteWalker::new(patterns);
    let err = walker.walk(module.operation()).unwrap_err();
    let err = err.downcast_ref::<IrError>().unwrap();
    assert!(matches!(err, IrError::RewriteContractViolation(_)));
}

/// Erases any `test.dead` operation whose results are unused.
struct EraseDead;

impl RewritePattern for EraseDead {
    fn name(&self) -> &'static str {
        "test::EraseDead"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new("test.dead"))
    }
    fn match_and_rewrite(
        &self,
        op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        let used = op.rd().results().iter().any(|result| result.rd().is_used());
        if used {
            return Ok(RewriteResult::Unchanged);
        }
        rewriter.erase()?;
        Ok(RewriteResult::Changed)
    }
}

#[test]
fn decreasing_patterns_reach_fixpoint() {
    // A chain a <- b <- c where only erasing c unblocks b, and so on.
    let module = ModuleOp::new();
    let body = module.body();
    let a = OperationBuilder::new("test.dead")
        .result(Type::Integer(8))
        .build();
    body.push_op(a.clone());
    let b = OperationBuilder::new("test.dead")
        .operand(&a.rd().result(0).unwrap())
        .result(Type::Integer(8))
        .build();
    body.push_op(b.clone());
    let c = OperationBuilder::new("test.dead")
        .operand(&b.rd().result(0).unwrap())
        .result(Type::Integer(8))
        .build();
    body.push_op(c);

    let mut patterns = PatternSet::new();
    patterns.add(Box::new(EraseDead));
    let config = WalkConfig {
        recursive: true,
        ..WalkConfig::default()
    };
    let walker = PatternRewriteWalker::with_config(patterns, config);
    let result = walker.walk(module.operation()).unwrap();
    assert_eq!(result, RewriteResult::Changed);
    assert_eq!(body.rd().num_ops(), 0);
}

#[test]
fn non_recursive_walk_is_a_single_pass() {
    let module = ModuleOp::new();
    let body = module.body();
    let a = OperationBuilder::new("test.dead")
        .result(Type::Integer(8))
        .build();
    body.push_op(a.clone());
    let b = OperationBuilder::new("test.dead")
        .operand(&a.rd().result(0).unwrap())
        .result(Type::Integer(8))
        .build();
    body.push_op(b);

    let mut patterns = PatternSet::new();
    patterns.add(Box::new(EraseDead));
    let walker = PatternRewriteWalker::new(patterns);
    let result = walker.walk(module.operation()).unwrap();
    assert_eq!(result, RewriteResult::Changed);
    // Head to tail: a is still used when visited, b gets erased, and without
    // `recursive` nobody comes back for a.
    assert_eq!(body.rd().num_ops(), 1);
}

/// Commits up to `limit` times at the same `test.tick` by inserting markers.
struct Tick {
    limit: usize,
    count: Mutex<usize>,
}

impl RewritePattern for Tick {
    fn name(&self) -> &'static str {
        "test::Tick"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new("test.tick"))
    }
    fn match_and_rewrite(
        &self,
        _op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        let mut count = self.count.lock();
        if *count == self.limit {
            return Ok(RewriteResult::Unchanged);
        }
        *count += 1;
        rewriter.insert_before(OperationBuilder::new("test.tock").build())?;
        Ok(RewriteResult::Changed)
    }
}

#[test]
fn first_match_commits_once_per_visit() {
    let module = ModuleOp::new();
    module
        .body()
        .push_op(OperationBuilder::new("test.tick").build());
    let mut patterns = PatternSet::new();
    patterns.add(Box::new(Tick {
        limit: 3,
        count: Mutex::new(0),
    }));
    let walker = PatternRewriteWalker::new(patterns);
    walker.walk(module.operation()).unwrap();
    // One commit for the single visit.
    assert_eq!(module.body().rd().num_ops(), 2);
}

#[test]
fn saturate_retries_until_decline() {
    let module = ModuleOp::new();
    module
        .body()
        .push_op(OperationBuilder::new("test.tick").build());
    let mut patterns = PatternSet::with_policy(MatchPolicy::Saturate);
    patterns.add(Box::new(Tick {
        limit: 3,
        count: Mutex::new(0),
    }));
    let walker = PatternRewriteWalker::new(patterns);
    walker.walk(module.operation()).unwrap();
    assert_eq!(module.body().rd().num_ops(), 4);
}

/// Swaps the use of `from` for `to` on every `test.use`.
struct SwapOperand {
    to: Shared<Value>,
}

impl RewritePattern for SwapOperand {
    fn name(&self) -> &'static str {
        "test::SwapOperand"
    }
    fn root_kind(&self) -> Option<OpName> {
        Some(OpName::new("test.use"))
    }
    fn match_and_rewrite(
        &self,
        _op: &Shared<Operation>,
        rewriter: &mut PatternRewriter,
    ) -> anyhow::Result<RewriteResult> {
        rewriter.set_operand(0, self.to.clone())?;
        Ok(RewriteResult::Changed)
    }
}

#[test]
fn set_operand_keeps_use_lists_exact() {
    let module = ModuleOp::new();
    let body = module.body();
    let from = body.add_argument(Type::Integer(8));
    let to = body.add_argument(Type::Integer(8));
    let user = OperationBuilder::new("test.use").operand(&from).build();
    body.push_op(user.clone());

    let mut patterns = PatternSet::new();
    patterns.add(Box::new(SwapOperand { to: to.clone() }));
    PatternRewriteWalker::new(patterns)
        .walk(module.operation())
        .unwrap();

    assert!(!from.rd().is_used());
    assert_eq!(to.rd().uses().len(), 1);
    assert!(Arc::ptr_eq(&user.rd().operand(0).unwrap(), &to));
    assert_use_lists_exact(module.operation());
}

/// Check that every value's use list matches the operand references exactly.
fn assert_use_lists_exact(root: &Shared<Operation>) {
    let mut values: Vec<Shared<Value>> = vec![];
    let mut expected: Vec<(usize, usize, usize)> = vec![];
    collect(root, &mut values, &mut expected);
    for value in values {
        let value_key = Arc::as_ptr(&value) as usize;
        let mut wanted: Vec<(usize, usize)> = expected
            .iter()
            .filter(|(v, _, _)| *v == value_key)
            .map(|(_, op, index)| (*op, *index))
            .collect();
        let guard = value.rd();
        let mut actual: Vec<(usize, usize)> = guard
            .uses()
            .iter()
            .map(|usage: &Use| {
                let op = usage.operation().expect("use of a dropped operation");
                (Arc::as_ptr(&op) as usize, usage.index())
            })
            .collect();
        wanted.sort_unstable();
        actual.sort_unstable();
        assert_eq!(wanted, actual);
    }
}

fn collect(
    op: &Shared<Operation>,
    values: &mut Vec<Shared<Value>>,
    expected: &mut Vec<(usize, usize, usize)>,
) {
    let op_key = Arc::as_ptr(op) as usize;
    for (index, operand) in op.rd().operands().iter().enumerate() {
        expected.push((Arc::as_ptr(operand) as usize, op_key, index));
    }
    values.extend(op.rd().results());
    for region in op.rd().regions() {
        for block in region.rd().blocks() {
            values.extend(block.rd().arguments());
            for inner in block.rd().ops() {
                collect(&inner, values, expected);
            }
        }
    }
}
