use crate::error::IrError;
use crate::ir::replace_all_uses;
use crate::ir::Operation;
use crate::ir::OperationExt;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;

/// The mutation handle a pattern rewrites through.
///
/// A rewriter is bound to exactly one matched operation for the duration of
/// the pattern callback. Each operation on the handle is atomic with respect
/// to the data-model invariants: use lists and parent links are consistent
/// again before the call returns. Contract violations (mismatched
/// replacement counts, erasing a still-used operation) are programming
/// errors in the pattern and surface as
/// [IrError::RewriteContractViolation].
pub struct PatternRewriter {
    op: Shared<Operation>,
    inserted: Vec<Shared<Operation>>,
    touched: Vec<Shared<Operation>>,
    erased: bool,
}

impl PatternRewriter {
    pub(crate) fn new(op: Shared<Operation>) -> Self {
        Self {
            op,
            inserted: vec![],
            touched: vec![],
            erased: false,
        }
    }
    /// Record the operations defining the operands of `op` (and of its
    /// nested operations): erasing `op` drops their use counts, which can
    /// make them eligible for other patterns.
    fn record_producers(&mut self, op: &Shared<Operation>) {
        let mut stack = vec![op.clone()];
        while let Some(current) = stack.pop() {
            for operand in current.rd().operands() {
                if let Some(producer) = operand.rd().defining_op() {
                    self.touched.push(producer);
                }
            }
            stack.extend(current.nested_ops());
        }
    }
    /// The matched operation this handle is bound to.
    pub fn op(&self) -> &Shared<Operation> {
        &self.op
    }
    /// Rewire every use of the matched operation's results to the
    /// corresponding entry in `new_values`, then erase it.
    ///
    /// Exactly one replacement value must be supplied per result, by
    /// position. Consumer operand order is preserved.
    pub fn replace(&mut self, new_values: Vec<Shared<Value>>) -> Result<()> {
        let results = self.op.rd().results();
        if results.len() != new_values.len() {
            return Err(IrError::RewriteContractViolation(format!(
                "Replacing '{}' requires {} values, got {}",
                self.op.rd().name(),
                results.len(),
                new_values.len()
            ))
            .into());
        }
        self.record_producers(&self.op.clone());
        for (old, new) in results.iter().zip(new_values.iter()) {
            let consumers = replace_all_uses(old, new);
            self.touched.extend(consumers);
        }
        self.op.erase()?;
        self.erased = true;
        Ok(())
    }
    /// Insert `new_ops` in the matched operation's place and replace its
    /// results with the results of the last inserted operation.
    pub fn replace_with_ops(&mut self, new_ops: Vec<Shared<Operation>>) -> Result<()> {
        let last = match new_ops.last() {
            Some(last) => last.clone(),
            None => {
                return Err(IrError::RewriteContractViolation(format!(
                    "Replacing '{}' requires at least one new operation",
                    self.op.rd().name()
                ))
                .into());
            }
        };
        for new_op in new_ops {
            self.insert_before(new_op)?;
        }
        let values = last.rd().results();
        self.replace(values)
    }
    /// Remove the matched operation.
    ///
    /// Legal only if none of its results have remaining uses; enforced, not
    /// advisory.
    pub fn erase(&mut self) -> Result<()> {
        self.record_producers(&self.op.clone());
        self.op.erase()?;
        self.erased = true;
        Ok(())
    }
    /// Splice a new operation directly before the matched one.
    pub fn insert_before(&mut self, new_op: Shared<Operation>) -> Result<()> {
        self.op.insert_before(new_op.clone())?;
        self.inserted.push(new_op);
        Ok(())
    }
    /// Splice a new operation directly after the matched one.
    pub fn insert_after(&mut self, new_op: Shared<Operation>) -> Result<()> {
        self.op.insert_after(new_op.clone())?;
        self.inserted.push(new_op);
        Ok(())
    }
    /// Rewire a single operand of the matched operation, updating the use
    /// lists of the old and new value atomically.
    pub fn set_operand(&mut self, index: usize, value: Shared<Value>) -> Result<()> {
        self.op.set_operand(index, value)
    }
    /// Whether the matched operation was erased by this handle.
    pub(crate) fn erased(&self) -> bool {
        self.erased
    }
    /// Operations inserted by this handle, in insertion order.
    pub(crate) fn inserted(&self) -> &[Shared<Operation>] {
        &self.inserted
    }
    /// Operations left modified by this handle: consumers rewired by
    /// `replace` and producers whose use counts dropped on erase.
    pub(crate) fn touched(&self) -> &[Shared<Operation>] {
        &self.touched
    }
}
