//! Verification of operations and whole graphs.
//!
//! Verification is read-only and aborts at the first failure inside a
//! subtree, surfacing the operation kind and expected-vs-actual values.
//! Single instances are checked in two ordered phases: the generic schema
//! phase (slot counts and constraints) and the operation kind's own custom
//! phase. Whole graphs additionally get the structural checks: dominance,
//! terminator placement, successor containment, and carried block-argument
//! typing.

use crate::error::IrError;
use crate::ir::Block;
use crate::ir::ModuleOp;
use crate::ir::Operation;
use crate::ir::Region;
use crate::schema::assign_slots;
use crate::schema::expected_count;
use crate::schema::CarriedArgs;
use crate::schema::DialectRegistry;
use crate::schema::RegionKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Run the two verification phases on one operation instance.
///
/// Phase 1 resolves the actual operand/result/attribute/region lists against
/// the schema slots and checks every constraint; phase 2 runs the kind's own
/// verifier, only if phase 1 passed.
pub fn verify_operation(registry: &DialectRegistry, operation: &Operation) -> Result<()> {
    let name = operation.name().clone();
    let schema = registry.get(&name).ok_or_else(|| {
        IrError::SchemaMismatch(format!(
            "'{name}' is not registered with the dialect registry"
        ))
    })?;

    let operand_types = operation.operand_types();
    let slots = schema.operand_slots();
    let assigned =
        assign_slots(slots, |slot| slot.cardinality, operand_types.len()).ok_or_else(|| {
            IrError::SchemaMismatch(format!(
                "'{name}' expected {} operands, got {}",
                expected_count(slots, |slot| slot.cardinality),
                operand_types.len()
            ))
        })?;
    for (index, (typ, slot)) in operand_types.iter().zip(assigned.iter()).enumerate() {
        if !slot.constraint.check(typ) {
            return Err(IrError::SchemaMismatch(format!(
                "Operand #{index} ({}) of '{name}' has wrong type, expected {}, got {}",
                slot.name,
                slot.constraint.describe(),
                typ
            ))
            .into());
        }
    }

    let result_types = operation.result_types();
    let slots = schema.result_slots();
    let assigned =
        assign_slots(slots, |slot| slot.cardinality, result_types.len()).ok_or_else(|| {
            IrError::SchemaMismatch(format!(
                "'{name}' expected {} results, got {}",
                expected_count(slots, |slot| slot.cardinality),
                result_types.len()
            ))
        })?;
    for (index, (typ, slot)) in result_types.iter().zip(assigned.iter()).enumerate() {
        if !slot.constraint.check(typ) {
            return Err(IrError::SchemaMismatch(format!(
                "Result #{index} ({}) of '{name}' has wrong type, expected {}, got {}",
                slot.name,
                slot.constraint.describe(),
                typ
            ))
            .into());
        }
    }

    for slot in schema.attribute_slots() {
        match operation.attribute(slot.name) {
            None => {
                if slot.required {
                    return Err(IrError::SchemaMismatch(format!(
                        "'{name}' requires attribute \"{}\"",
                        slot.name
                    ))
                    .into());
                }
            }
            Some(attribute) => {
                if !slot.constraint.check(attribute) {
                    return Err(IrError::SchemaMismatch(format!(
                        "Attribute \"{}\" of '{name}' has wrong value, expected {}, got {}",
                        slot.name,
                        slot.constraint.describe(),
                        attribute.kind()
                    ))
                    .into());
                }
            }
        }
    }

    let regions = operation.regions();
    if regions.len() != schema.region_slots().len() {
        return Err(IrError::SchemaMismatch(format!(
            "'{name}' expected {} regions, got {}",
            schema.region_slots().len(),
            regions.len()
        ))
        .into());
    }
    for (index, (region, slot)) in regions.iter().zip(schema.region_slots()).enumerate() {
        let blocks = region.rd().num_blocks();
        if slot.kind == RegionKind::SingleBlock && blocks != 1 {
            return Err(IrError::SchemaMismatch(format!(
                "Region #{index} ({}) of '{name}' must contain exactly one block, got {blocks}",
                slot.name
            ))
            .into());
        }
    }

    if operation.num_successors() > 0 && !schema.is_terminator() {
        return Err(IrError::SchemaMismatch(format!(
            "'{name}' is not a terminator and cannot declare successors"
        ))
        .into());
    }

    if let Some(custom) = schema.custom() {
        custom(operation).map_err(IrError::SemanticVerificationFailure)?;
    }
    Ok(())
}

/// Whole-graph structural verification.
pub struct Verifier<'a> {
    registry: &'a DialectRegistry,
}

impl<'a> Verifier<'a> {
    pub fn new(registry: &'a DialectRegistry) -> Self {
        Self { registry }
    }
    /// Verify the graph rooted at `root`, which must be a `builtin.module`.
    pub fn verify(&self, root: &Shared<Operation>) -> Result<()> {
        {
            let guard = root.rd();
            if !guard.name().is(ModuleOp::NAME) {
                return Err(IrError::StructuralViolation(format!(
                    "Expected {} as the top-level operation, got '{}'",
                    ModuleOp::NAME,
                    guard.name()
                ))
                .into());
            }
        }
        let mut scope = vec![];
        self.verify_op(root, &mut scope)
    }
    fn verify_op(
        &self,
        op: &Shared<Operation>,
        scope: &mut Vec<HashSet<usize>>,
    ) -> Result<()> {
        let regions = {
            let guard = op.rd();
            verify_operation(self.registry, &guard)?;
            // The schema is present, verify_operation checked that.
            let schema = self.registry.get(guard.name()).unwrap();
            if let Some(carried) = schema.carried() {
                check_carried_args(&guard, carried)?;
            }
            guard.regions()
        };
        for region in regions {
            self.verify_region(&region, scope)?;
        }
        Ok(())
    }
    fn verify_region(
        &self,
        region: &Shared<Region>,
        scope: &mut Vec<HashSet<usize>>,
    ) -> Result<()> {
        for block in region.rd().blocks() {
            let mut layer = HashSet::new();
            for argument in block.rd().arguments() {
                layer.insert(Arc::as_ptr(&argument) as usize);
            }
            scope.push(layer);
            let result = self.verify_block(&block, scope);
            scope.pop();
            result?;
        }
        Ok(())
    }
    fn verify_block(
        &self,
        block: &Shared<Block>,
        scope: &mut Vec<HashSet<usize>>,
    ) -> Result<()> {
        let region = block.rd().parent();
        let ops = block.rd().ops();
        let last = ops.len().saturating_sub(1);
        for (index, op) in ops.iter().enumerate() {
            let results = {
                let guard = op.rd();
                let name = guard.name().clone();
                if let Some(schema) = self.registry.get(&name) {
                    if schema.is_terminator() && index != last {
                        return Err(IrError::StructuralViolation(format!(
                            "Terminator '{name}' must be the last operation in its block"
                        ))
                        .into());
                    }
                }
                for successor in guard.successors() {
                    let successor_region = successor.rd().parent();
                    let contained = match (&region, &successor_region) {
                        (Some(here), Some(there)) => Arc::ptr_eq(here, there),
                        _ => false,
                    };
                    if !contained {
                        return Err(IrError::StructuralViolation(format!(
                            "Successor of '{name}' is not a block of the enclosing region"
                        ))
                        .into());
                    }
                }
                for (position, operand) in guard.operands().iter().enumerate() {
                    let key = Arc::as_ptr(operand) as usize;
                    if !scope.iter().any(|layer| layer.contains(&key)) {
                        return Err(IrError::StructuralViolation(format!(
                            "Operand #{position} of '{name}' does not dominate its use"
                        ))
                        .into());
                    }
                }
                guard.results()
            };
            self.verify_op(op, scope)?;
            let layer = scope.last_mut().expect("no scope layer for block");
            for result in results {
                layer.insert(Arc::as_ptr(&result) as usize);
            }
        }
        Ok(())
    }
}

/// Check that a region's entry-block arguments match the carried operands.
///
/// A mismatch fails verification; it is never silently coerced.
fn check_carried_args(operation: &Operation, carried: &CarriedArgs) -> Result<()> {
    let region = match operation.region(carried.region) {
        Some(region) => region,
        None => return Ok(()),
    };
    let entry = match region.rd().entry() {
        Some(entry) => entry,
        None => return Ok(()),
    };
    let arguments = entry.rd().arguments();
    let operands = operation.operands();
    let carried_operands = operands.get(carried.skip_operands..).unwrap_or(&[]);
    let expected_len = carried.leading_args + carried_operands.len();
    if arguments.len() != expected_len {
        return Err(IrError::StructuralViolation(format!(
            "Expected {} block arguments, got {}",
            expected_len,
            arguments.len()
        ))
        .into());
    }
    for (argument, operand) in arguments[carried.leading_args..]
        .iter()
        .zip(carried_operands.iter())
    {
        let expected = operand.rd().typ();
        let got = argument.rd().typ();
        if expected != got {
            return Err(IrError::StructuralViolation(format!(
                "Block arguments with wrong type, expected {expected}, got {got}"
            ))
            .into());
        }
    }
    Ok(())
}
