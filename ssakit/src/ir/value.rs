use crate::ir::Block;
use crate::ir::Operation;
use crate::ir::Type;
use crate::shared::weak;
use crate::shared::Shared;
use crate::shared::SharedExt;
use crate::shared::WeakShared;
use std::sync::Arc;

/// One read of a value: operation `operation` reads it at operand position
/// `index`.
///
/// Uses live on the value being read so that all consumers are enumerable in
/// O(uses) and can be rewired atomically. The operation link is weak; the
/// ownership tree is the only strong relation in the graph.
#[derive(Clone)]
pub struct Use {
    operation: WeakShared<Operation>,
    index: usize,
}

impl Use {
    pub fn new(operation: WeakShared<Operation>, index: usize) -> Self {
        Self { operation, index }
    }
    /// The consuming operation, `None` once the consumer was dropped.
    pub fn operation(&self) -> Option<Shared<Operation>> {
        self.operation.upgrade()
    }
    pub fn index(&self) -> usize {
        self.index
    }
    fn is(&self, operation: &Shared<Operation>, index: usize) -> bool {
        self.index == index && std::ptr::eq(self.operation.as_ptr(), Arc::as_ptr(operation))
    }
}

/// An argument of a block, e.g. the induction variable of a loop body.
pub struct BlockArgument {
    typ: Type,
    index: usize,
    parent: Option<WeakShared<Block>>,
    uses: Vec<Use>,
}

impl BlockArgument {
    pub fn new(typ: Type, index: usize, parent: Option<WeakShared<Block>>) -> Self {
        Self {
            typ,
            index,
            parent,
            uses: vec![],
        }
    }
    pub fn parent(&self) -> Option<Shared<Block>> {
        self.parent.as_ref().and_then(|parent| parent.upgrade())
    }
}

/// A result slot of an operation.
pub struct OpResult {
    typ: Type,
    index: usize,
    defining_op: Option<WeakShared<Operation>>,
    uses: Vec<Use>,
}

impl OpResult {
    pub fn new(typ: Type, index: usize, defining_op: Option<WeakShared<Operation>>) -> Self {
        Self {
            typ,
            index,
            defining_op,
            uses: vec![],
        }
    }
    pub fn defining_op(&self) -> Option<Shared<Operation>> {
        self.defining_op.as_ref().and_then(|op| op.upgrade())
    }
}

/// A typed, single-definition value.
///
/// A value is defined exactly once, either as an operation result or as a
/// block argument, and is held by reference ([`Shared<Value>`]) everywhere it
/// is used. Its use list is kept exact by the mutation entry points in
/// [crate::ir::operation]: every change to an operand reference updates the
/// use lists of the old and new value in the same step.
pub enum Value {
    BlockArgument(BlockArgument),
    OpResult(OpResult),
}

impl Value {
    pub fn typ(&self) -> Type {
        match self {
            Value::BlockArgument(arg) => arg.typ.clone(),
            Value::OpResult(result) => result.typ.clone(),
        }
    }
    pub fn set_typ(&mut self, typ: Type) {
        match self {
            Value::BlockArgument(arg) => arg.typ = typ,
            Value::OpResult(result) => result.typ = typ,
        }
    }
    /// The slot position at the defining site.
    pub fn index(&self) -> usize {
        match self {
            Value::BlockArgument(arg) => arg.index,
            Value::OpResult(result) => result.index,
        }
    }
    /// The operation defining this value, `None` for block arguments.
    pub fn defining_op(&self) -> Option<Shared<Operation>> {
        match self {
            Value::BlockArgument(_) => None,
            Value::OpResult(result) => result.defining_op(),
        }
    }
    /// The block declaring this value, `None` for operation results.
    pub fn parent_block(&self) -> Option<Shared<Block>> {
        match self {
            Value::BlockArgument(arg) => arg.parent(),
            Value::OpResult(_) => None,
        }
    }
    pub fn uses(&self) -> &[Use] {
        match self {
            Value::BlockArgument(arg) => &arg.uses,
            Value::OpResult(result) => &result.uses,
        }
    }
    pub fn is_used(&self) -> bool {
        !self.uses().is_empty()
    }
    fn uses_mut(&mut self) -> &mut Vec<Use> {
        match self {
            Value::BlockArgument(arg) => &mut arg.uses,
            Value::OpResult(result) => &mut result.uses,
        }
    }
    pub(crate) fn add_use(&mut self, usage: Use) {
        self.uses_mut().push(usage);
    }
    pub(crate) fn remove_use(&mut self, operation: &Shared<Operation>, index: usize) {
        let uses = self.uses_mut();
        if let Some(position) = uses.iter().position(|usage| usage.is(operation, index)) {
            uses.remove(position);
        }
    }
    pub(crate) fn take_uses(&mut self) -> Vec<Use> {
        std::mem::take(self.uses_mut())
    }
}

/// Rewire every use of `old` to `new` and return the rewired consumers.
///
/// Consumer operand order is preserved: each use keeps its operand position,
/// only the referenced value changes. A no-op when `old` and `new` are the
/// same value.
pub fn replace_all_uses(old: &Shared<Value>, new: &Shared<Value>) -> Vec<Shared<Operation>> {
    if Arc::ptr_eq(old, new) {
        return vec![];
    }
    let uses = old.wr().take_uses();
    let mut rewired = vec![];
    for usage in uses {
        let operation = match usage.operation() {
            Some(operation) => operation,
            None => continue,
        };
        operation
            .wr()
            .set_operand_raw(usage.index(), new.clone());
        new.wr()
            .add_use(Use::new(weak(&operation), usage.index()));
        rewired.push(operation);
    }
    rewired
}
