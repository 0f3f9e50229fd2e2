use crate::error::IrError;
use crate::ir::Attribute;
use crate::ir::Attributes;
use crate::ir::Block;
use crate::ir::BlockExt;
use crate::ir::OpResult;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Use;
use crate::ir::Value;
use crate::shared::weak;
use crate::shared::Shared;
use crate::shared::SharedExt;
use crate::shared::WeakShared;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// The kind identifier of an operation, e.g. `arith.addi`.
///
/// The part before the first dot is the dialect namespace. All schema-driven
/// behavior is looked up by this name in the
/// [crate::schema::DialectRegistry].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpName {
    name: String,
}

impl OpName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
    pub fn as_str(&self) -> &str {
        &self.name
    }
    pub fn dialect(&self) -> &str {
        self.name.split('.').next().unwrap_or("")
    }
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl From<&str> for OpName {
    fn from(name: &str) -> Self {
        OpName::new(name)
    }
}

impl Display for OpName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named computation node in the graph.
///
/// An operation owns its result values and its regions; operands and
/// successors are non-owning references. It belongs to exactly one block, or
/// is detached (freshly built, or erased). Operations are generic over their
/// kind: what a kind requires of its operands, results, attributes, and
/// regions is declared in its [crate::schema::OpSchema], not in a subtype.
pub struct Operation {
    name: OpName,
    operands: Vec<Shared<Value>>,
    attributes: Attributes,
    results: Vec<Shared<Value>>,
    regions: Vec<Shared<Region>>,
    successors: Vec<WeakShared<Block>>,
    parent: Option<WeakShared<Block>>,
}

impl Operation {
    pub fn name(&self) -> &OpName {
        &self.name
    }
    pub fn operands(&self) -> Vec<Shared<Value>> {
        self.operands.clone()
    }
    pub fn operand(&self, index: usize) -> Option<Shared<Value>> {
        self.operands.get(index).cloned()
    }
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }
    pub fn operand_types(&self) -> Vec<Type> {
        self.operands
            .iter()
            .map(|operand| operand.rd().typ())
            .collect()
    }
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
    pub fn results(&self) -> Vec<Shared<Value>> {
        self.results.clone()
    }
    pub fn result(&self, index: usize) -> Option<Shared<Value>> {
        self.results.get(index).cloned()
    }
    pub fn num_results(&self) -> usize {
        self.results.len()
    }
    pub fn result_types(&self) -> Vec<Type> {
        self.results
            .iter()
            .map(|result| result.rd().typ())
            .collect()
    }
    pub fn regions(&self) -> Vec<Shared<Region>> {
        self.regions.clone()
    }
    pub fn region(&self, index: usize) -> Option<Shared<Region>> {
        self.regions.get(index).cloned()
    }
    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }
    /// Successor blocks of a terminator. Dropped blocks are skipped.
    pub fn successors(&self) -> Vec<Shared<Block>> {
        self.successors
            .iter()
            .filter_map(|successor| successor.upgrade())
            .collect()
    }
    pub fn num_successors(&self) -> usize {
        self.successors.len()
    }
    pub fn set_successors(&mut self, successors: Vec<WeakShared<Block>>) {
        self.successors = successors;
    }
    /// The block containing this operation, `None` when detached.
    pub fn parent(&self) -> Option<Shared<Block>> {
        self.parent.as_ref().and_then(|parent| parent.upgrade())
    }
    pub fn set_parent(&mut self, parent: Option<WeakShared<Block>>) {
        self.parent = parent;
    }
    pub(crate) fn set_operand_raw(&mut self, index: usize, value: Shared<Value>) {
        self.operands[index] = value;
    }
    pub(crate) fn push_result(&mut self, result: Shared<Value>) {
        self.results.push(result);
    }
}

/// Builds an [Operation] from already-typed operands and an attribute map.
///
/// `build` wires the use list of every operand and creates fresh result
/// values owned by the new operation; the operation comes out detached and is
/// inserted through [BlockExt] or the rewriter handle.
#[must_use = "the builder does nothing until `build` is called"]
pub struct OperationBuilder {
    name: OpName,
    operands: Vec<Shared<Value>>,
    attributes: Attributes,
    result_types: Vec<Type>,
    regions: Vec<Shared<Region>>,
    successors: Vec<WeakShared<Block>>,
}

impl OperationBuilder {
    pub fn new(name: impl Into<OpName>) -> Self {
        Self {
            name: name.into(),
            operands: vec![],
            attributes: Attributes::new(),
            result_types: vec![],
            regions: vec![],
            successors: vec![],
        }
    }
    pub fn operand(mut self, operand: &Shared<Value>) -> Self {
        self.operands.push(operand.clone());
        self
    }
    pub fn operands(mut self, operands: Vec<Shared<Value>>) -> Self {
        self.operands.extend(operands);
        self
    }
    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
    pub fn result(mut self, typ: Type) -> Self {
        self.result_types.push(typ);
        self
    }
    pub fn results(mut self, types: Vec<Type>) -> Self {
        self.result_types.extend(types);
        self
    }
    pub fn region(mut self, region: Shared<Region>) -> Self {
        self.regions.push(region);
        self
    }
    pub fn successor(mut self, block: &Shared<Block>) -> Self {
        self.successors.push(weak(block));
        self
    }
    pub fn build(self) -> Shared<Operation> {
        let operation = Operation {
            name: self.name,
            operands: self.operands,
            attributes: self.attributes,
            results: vec![],
            regions: self.regions,
            successors: self.successors,
            parent: None,
        };
        let operation = Shared::new(operation.into());
        {
            let guard = operation.rd();
            for (index, operand) in guard.operands.iter().enumerate() {
                operand.wr().add_use(Use::new(weak(&operation), index));
            }
            for region in guard.regions.iter() {
                region.wr().set_parent(Some(weak(&operation)));
            }
        }
        for (index, typ) in self.result_types.into_iter().enumerate() {
            let result = OpResult::new(typ, index, Some(weak(&operation)));
            let result = Shared::new(Value::OpResult(result).into());
            operation.wr().push_result(result);
        }
        operation
    }
    /// Like [OperationBuilder::build], but validates slot counts and
    /// constraints against the registered schema before handing the
    /// operation out.
    pub fn build_checked(
        self,
        registry: &crate::schema::DialectRegistry,
    ) -> Result<Shared<Operation>> {
        let operation = self.build();
        registry.verify_operation(&operation.rd())?;
        Ok(operation)
    }
}

/// Mutation and navigation helpers on a shared operation.
///
/// These are the only entry points that change operand references, so they
/// are also the place where use lists are kept exact.
pub trait OperationExt {
    /// Rewire the operand at `index`, updating the use lists of the old and
    /// new value in the same step.
    fn set_operand(&self, index: usize, value: Shared<Value>) -> Result<()>;
    /// Insert the detached operation `new` directly before this one.
    fn insert_before(&self, new: Shared<Operation>) -> Result<()>;
    /// Insert the detached operation `new` directly after this one.
    fn insert_after(&self, new: Shared<Operation>) -> Result<()>;
    /// Remove this operation from the graph.
    ///
    /// Fails with a [IrError::RewriteContractViolation] if any result still
    /// has uses. Severs the parent link and removes this operation's reads
    /// (including reads made by nested operations) from all use lists.
    fn erase(&self) -> Result<()>;
    /// The operation owning the block this operation lives in.
    fn parent_op(&self) -> Option<Shared<Operation>>;
    /// The operations directly contained in this operation's regions.
    fn nested_ops(&self) -> Vec<Shared<Operation>>;
    /// Clone this operation including nested regions, creating fresh
    /// identities for every contained value and block.
    fn deep_clone(&self) -> Shared<Operation>;
}

impl OperationExt for Shared<Operation> {
    fn set_operand(&self, index: usize, value: Shared<Value>) -> Result<()> {
        let old = self.rd().operand(index).ok_or_else(|| {
            IrError::RewriteContractViolation(format!(
                "Operand index {} out of range for '{}'",
                index,
                self.rd().name()
            ))
        })?;
        if Arc::ptr_eq(&old, &value) {
            return Ok(());
        }
        old.wr().remove_use(self, index);
        self.wr().set_operand_raw(index, value.clone());
        value.wr().add_use(Use::new(weak(self), index));
        Ok(())
    }
    fn insert_before(&self, new: Shared<Operation>) -> Result<()> {
        let parent = self.rd().parent().ok_or_else(|| {
            IrError::RewriteContractViolation(format!(
                "Cannot insert next to detached operation '{}'",
                self.rd().name()
            ))
        })?;
        let index = parent.rd().index_of(self).ok_or_else(|| {
            IrError::RewriteContractViolation(format!(
                "Operation '{}' not found in its parent block",
                self.rd().name()
            ))
        })?;
        parent.insert_op(index, new);
        Ok(())
    }
    fn insert_after(&self, new: Shared<Operation>) -> Result<()> {
        let parent = self.rd().parent().ok_or_else(|| {
            IrError::RewriteContractViolation(format!(
                "Cannot insert next to detached operation '{}'",
                self.rd().name()
            ))
        })?;
        let index = parent.rd().index_of(self).ok_or_else(|| {
            IrError::RewriteContractViolation(format!(
                "Operation '{}' not found in its parent block",
                self.rd().name()
            ))
        })?;
        parent.insert_op(index + 1, new);
        Ok(())
    }
    fn erase(&self) -> Result<()> {
        for result in self.rd().results() {
            let result = result.rd();
            if result.is_used() {
                return Err(IrError::RewriteContractViolation(format!(
                    "Cannot erase '{}': result #{} still has {} uses",
                    self.rd().name(),
                    result.index(),
                    result.uses().len()
                ))
                .into());
            }
        }
        let mut worklist = vec![self.clone()];
        while let Some(operation) = worklist.pop() {
            for (index, operand) in operation.rd().operands().iter().enumerate() {
                operand.wr().remove_use(&operation, index);
            }
            worklist.extend(operation.nested_ops());
        }
        if let Some(parent) = self.rd().parent() {
            parent.wr().remove_op_raw(self);
        }
        self.wr().set_parent(None);
        Ok(())
    }
    fn parent_op(&self) -> Option<Shared<Operation>> {
        let block = self.rd().parent()?;
        let region = block.rd().parent()?;
        let parent = region.rd().parent();
        parent
    }
    fn nested_ops(&self) -> Vec<Shared<Operation>> {
        let mut out = vec![];
        for region in self.rd().regions() {
            for block in region.rd().blocks() {
                out.extend(block.rd().ops());
            }
        }
        out
    }
    fn deep_clone(&self) -> Shared<Operation> {
        let mut values = HashMap::new();
        let mut blocks = HashMap::new();
        clone_op(self, &mut values, &mut blocks)
    }
}

fn ptr_key<T>(shared: &Shared<T>) -> usize {
    Arc::as_ptr(shared) as usize
}

fn clone_op(
    operation: &Shared<Operation>,
    values: &mut HashMap<usize, Shared<Value>>,
    blocks: &mut HashMap<usize, Shared<Block>>,
) -> Shared<Operation> {
    let (name, operands, attributes, result_types, regions, successors) = {
        let guard = operation.rd();
        (
            guard.name().clone(),
            guard.operands(),
            guard.attributes().clone(),
            guard.result_types(),
            guard.regions(),
            guard.successors(),
        )
    };
    let operands = operands
        .iter()
        .map(|operand| {
            values
                .get(&ptr_key(operand))
                .cloned()
                .unwrap_or_else(|| operand.clone())
        })
        .collect();
    let cloned_regions = regions
        .iter()
        .map(|region| clone_region(region, values, blocks))
        .collect::<Vec<Shared<Region>>>();
    let mut builder = OperationBuilder::new(name)
        .operands(operands)
        .attributes(attributes)
        .results(result_types);
    for region in cloned_regions {
        builder = builder.region(region);
    }
    for successor in successors.iter() {
        let successor = blocks
            .get(&ptr_key(successor))
            .cloned()
            .unwrap_or_else(|| successor.clone());
        builder = builder.successor(&successor);
    }
    let cloned = builder.build();
    for (old, new) in operation.rd().results().iter().zip(cloned.rd().results()) {
        values.insert(ptr_key(old), new.clone());
    }
    cloned
}

fn clone_region(
    region: &Shared<Region>,
    values: &mut HashMap<usize, Shared<Value>>,
    blocks: &mut HashMap<usize, Shared<Block>>,
) -> Shared<Region> {
    let cloned_region = Shared::new(Region::new().into());
    // Pre-create the blocks (with fresh arguments) so that forward successor
    // references inside the region resolve to the clones.
    for block in region.rd().blocks() {
        let cloned_block = Shared::new(Block::new(block.rd().label().clone()).into());
        cloned_block
            .wr()
            .set_parent(Some(weak(&cloned_region)));
        cloned_region.wr().push_block_raw(cloned_block.clone());
        for argument in block.rd().arguments() {
            let cloned_argument = cloned_block.add_argument(argument.rd().typ());
            values.insert(ptr_key(&argument), cloned_argument);
        }
        blocks.insert(ptr_key(&block), cloned_block);
    }
    for block in region.rd().blocks() {
        let cloned_block = blocks.get(&ptr_key(&block)).cloned().unwrap();
        for operation in block.rd().ops() {
            let cloned_op = clone_op(&operation, values, blocks);
            cloned_block.push_op(cloned_op);
        }
    }
    cloned_region
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::replace_all_uses;
    use crate::ir::structurally_equal;
    use crate::ir::RegionExt;

    fn block_with_argument(typ: Type) -> (Shared<Block>, Shared<Value>) {
        let block: Shared<Block> = Shared::new(Block::default().into());
        let argument = block.add_argument(typ);
        (block, argument)
    }

    #[test]
    fn build_wires_use_lists() {
        let (_block, argument) = block_with_argument(Type::Integer(8));
        let op = OperationBuilder::new("test.use")
            .operand(&argument)
            .operand(&argument)
            .result(Type::Integer(8))
            .build();
        let guard = argument.rd();
        assert_eq!(guard.uses().len(), 2);
        assert_eq!(guard.uses()[0].index(), 0);
        assert_eq!(guard.uses()[1].index(), 1);
        assert!(Arc::ptr_eq(&guard.uses()[0].operation().unwrap(), &op));
        let result = op.rd().result(0).unwrap();
        assert!(Arc::ptr_eq(&result.rd().defining_op().unwrap(), &op));
        assert_eq!(result.rd().index(), 0);
    }

    #[test]
    fn set_operand_rewires_both_values() {
        let (block, first) = block_with_argument(Type::Integer(8));
        let second = block.add_argument(Type::Integer(8));
        let op = OperationBuilder::new("test.use")
            .operand(&first)
            .result(Type::Integer(8))
            .build();
        op.set_operand(0, second.clone()).unwrap();
        assert!(!first.rd().is_used());
        assert_eq!(second.rd().uses().len(), 1);
        assert_eq!(second.rd().uses()[0].index(), 0);
        assert!(Arc::ptr_eq(&op.rd().operand(0).unwrap(), &second));
    }

    #[test]
    fn erase_refuses_used_results() {
        let (block, _argument) = block_with_argument(Type::Integer(8));
        let def = OperationBuilder::new("test.def")
            .result(Type::Integer(8))
            .build();
        block.push_op(def.clone());
        let user = OperationBuilder::new("test.use")
            .operand(&def.rd().result(0).unwrap())
            .build();
        block.push_op(user.clone());

        let err = def.erase().unwrap_err();
        let err = err.downcast_ref::<crate::error::IrError>().unwrap();
        assert!(matches!(
            err,
            crate::error::IrError::RewriteContractViolation(_)
        ));

        user.erase().unwrap();
        assert!(user.rd().parent().is_none());
        assert!(!def.rd().result(0).unwrap().rd().is_used());
        def.erase().unwrap();
        assert_eq!(block.rd().num_ops(), 0);
    }

    #[test]
    fn replace_all_uses_preserves_operand_order() {
        let (block, keep) = block_with_argument(Type::Integer(8));
        let old = block.add_argument(Type::Integer(8));
        let new = block.add_argument(Type::Integer(8));
        let op = OperationBuilder::new("test.use")
            .operand(&keep)
            .operand(&old)
            .operand(&keep)
            .build();
        let consumers = replace_all_uses(&old, &new);
        assert_eq!(consumers.len(), 1);
        assert!(Arc::ptr_eq(&op.rd().operand(0).unwrap(), &keep));
        assert!(Arc::ptr_eq(&op.rd().operand(1).unwrap(), &new));
        assert!(Arc::ptr_eq(&op.rd().operand(2).unwrap(), &keep));
        assert!(!old.rd().is_used());
        assert_eq!(new.rd().uses().len(), 1);
    }

    #[test]
    fn deep_clone_creates_fresh_identities() {
        let region: Shared<Region> = Shared::new(Region::new().into());
        let entry = region.add_block();
        let argument = entry.add_argument(Type::Integer(8));
        let inner = OperationBuilder::new("test.inner")
            .operand(&argument)
            .result(Type::Integer(8))
            .build();
        entry.push_op(inner.clone());
        let outer = OperationBuilder::new("test.outer")
            .result(Type::Integer(8))
            .region(region)
            .build();

        let cloned = outer.deep_clone();
        assert!(structurally_equal(&outer, &cloned));
        let cloned_inner = cloned.nested_ops().remove(0);
        assert!(!Arc::ptr_eq(&inner, &cloned_inner));
        let cloned_argument = cloned.rd().region(0).unwrap().rd().entry().unwrap();
        let cloned_argument = cloned_argument.rd().argument(0).unwrap();
        assert!(!Arc::ptr_eq(&argument, &cloned_argument));
        // The clone's operand uses are tracked on the fresh argument.
        assert_eq!(argument.rd().uses().len(), 1);
        assert_eq!(cloned_argument.rd().uses().len(), 1);
    }
}
