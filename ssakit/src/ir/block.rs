use crate::ir::BlockArgument;
use crate::ir::Operation;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Value;
use crate::shared::weak;
use crate::shared::Shared;
use crate::shared::SharedExt;
use crate::shared::WeakShared;
use std::sync::Arc;

/// The label of a block.
///
/// Labels only matter to the textual format: the parser records them to
/// resolve successor references and the printer generates fresh ones, so a
/// block built programmatically can stay [BlockName::Unset].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockName {
    Name(String),
    Unset,
}

/// An ordered sequence of operations plus declared argument values.
///
/// A block belongs to exactly one region. It may end in one terminator
/// operation; whether the trailing operation must be a terminator is decided
/// by the verifier, not here.
pub struct Block {
    label: BlockName,
    arguments: Vec<Shared<Value>>,
    ops: Vec<Shared<Operation>>,
    parent: Option<WeakShared<Region>>,
}

impl Block {
    pub fn new(label: BlockName) -> Self {
        Self {
            label,
            arguments: vec![],
            ops: vec![],
            parent: None,
        }
    }
    pub fn label(&self) -> &BlockName {
        &self.label
    }
    pub fn set_label(&mut self, label: BlockName) {
        self.label = label;
    }
    pub fn arguments(&self) -> Vec<Shared<Value>> {
        self.arguments.clone()
    }
    pub fn argument(&self, index: usize) -> Option<Shared<Value>> {
        self.arguments.get(index).cloned()
    }
    pub fn argument_types(&self) -> Vec<Type> {
        self.arguments
            .iter()
            .map(|argument| argument.rd().typ())
            .collect()
    }
    pub fn num_arguments(&self) -> usize {
        self.arguments.len()
    }
    pub fn ops(&self) -> Vec<Shared<Operation>> {
        self.ops.clone()
    }
    pub fn op(&self, index: usize) -> Option<Shared<Operation>> {
        self.ops.get(index).cloned()
    }
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
    pub fn parent(&self) -> Option<Shared<Region>> {
        self.parent.as_ref().and_then(|parent| parent.upgrade())
    }
    pub fn set_parent(&mut self, parent: Option<WeakShared<Region>>) {
        self.parent = parent;
    }
    /// The position of `op` in this block, by identity.
    pub fn index_of(&self, op: &Shared<Operation>) -> Option<usize> {
        self.ops.iter().position(|current| Arc::ptr_eq(current, op))
    }
    pub(crate) fn push_argument(&mut self, argument: Shared<Value>) {
        self.arguments.push(argument);
    }
    pub(crate) fn insert_op_raw(&mut self, index: usize, op: Shared<Operation>) {
        self.ops.insert(index, op);
    }
    pub(crate) fn remove_op_raw(&mut self, op: &Shared<Operation>) {
        if let Some(index) = self.index_of(op) {
            self.ops.remove(index);
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new(BlockName::Unset)
    }
}

/// Mutation helpers on a shared block that keep parent links consistent.
pub trait BlockExt {
    /// Declare a new argument slot of the given type and return its value.
    fn add_argument(&self, typ: Type) -> Shared<Value>;
    /// Append a detached operation to the end of the block.
    fn push_op(&self, op: Shared<Operation>);
    /// Insert a detached operation at the given position.
    fn insert_op(&self, index: usize, op: Shared<Operation>);
}

impl BlockExt for Shared<Block> {
    fn add_argument(&self, typ: Type) -> Shared<Value> {
        let index = self.rd().num_arguments();
        let argument = BlockArgument::new(typ, index, Some(weak(self)));
        let argument = Shared::new(Value::BlockArgument(argument).into());
        self.wr().push_argument(argument.clone());
        argument
    }
    fn push_op(&self, op: Shared<Operation>) {
        let index = self.rd().num_ops();
        self.insert_op(index, op);
    }
    fn insert_op(&self, index: usize, op: Shared<Operation>) {
        op.wr().set_parent(Some(weak(self)));
        self.wr().insert_op_raw(index, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::OperationBuilder;

    #[test]
    fn push_sets_parent() {
        let block = Shared::new(Block::default().into());
        let op = OperationBuilder::new("test.noop").build();
        assert!(op.rd().parent().is_none());
        block.push_op(op.clone());
        let parent = op.rd().parent().unwrap();
        assert!(Arc::ptr_eq(&parent, &block));
        assert_eq!(block.rd().index_of(&op), Some(0));
    }

    #[test]
    fn argument_slots_are_ordered() {
        let block = Shared::new(Block::default().into());
        let first = block.add_argument(Type::Index);
        let second = block.add_argument(Type::Integer(8));
        assert_eq!(first.rd().index(), 0);
        assert_eq!(second.rd().index(), 1);
        assert_eq!(
            block.rd().argument_types(),
            vec![Type::Index, Type::Integer(8)]
        );
        // The block is the argument's single defining site.
        let parent = first.rd().parent_block().unwrap();
        assert!(Arc::ptr_eq(&parent, &block));
        assert!(first.rd().defining_op().is_none());
    }
}
