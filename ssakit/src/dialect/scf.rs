//! Structured control flow: loops with carried values.

use crate::ir::Operation;
use crate::ir::OperationBuilder;
use crate::ir::Region;
use crate::ir::RegionExt;
use crate::ir::Type;
use crate::ir::Value;
use crate::ir::BlockExt;
use crate::schema::Cardinality;
use crate::schema::CarriedArgs;
use crate::schema::Dialect;
use crate::schema::DialectRegistry;
use crate::schema::OpSchema;
use crate::schema::RegionKind;
use crate::schema::TypeConstraint;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;

pub const FOR: &str = "scf.for";
pub const YIELD: &str = "scf.yield";

/// How many leading `scf.for` operands are loop bounds rather than carried
/// values.
const BOUNDS: usize = 3;

pub struct Scf;

impl Dialect for Scf {
    fn name(&self) -> &'static str {
        "scf"
    }
    fn description(&self) -> &'static str {
        "Structured control flow constructs such as counted loops"
    }
    fn register_ops(&self, registry: &mut DialectRegistry) -> Result<()> {
        registry.insert(
            OpSchema::new(FOR)
                .operand("lower", Cardinality::One, TypeConstraint::Exactly(Type::Index))
                .operand("upper", Cardinality::One, TypeConstraint::Exactly(Type::Index))
                .operand("step", Cardinality::One, TypeConstraint::Exactly(Type::Index))
                .operand("init", Cardinality::Variadic, TypeConstraint::Any)
                .result("result", Cardinality::Variadic, TypeConstraint::Any)
                .region("body", RegionKind::SingleBlock)
                .carried_block_args(CarriedArgs {
                    region: 0,
                    skip_operands: BOUNDS,
                    leading_args: 1,
                })
                .custom_verify(verify_for),
        )?;
        registry.insert(
            OpSchema::new(YIELD)
                .operand("operands", Cardinality::Variadic, TypeConstraint::Any)
                .terminator(),
        )?;
        Ok(())
    }
}

/// The loop produces one result per carried value, with matching types, and
/// iterates over an `index` induction variable.
fn verify_for(operation: &Operation) -> std::result::Result<(), String> {
    let carried: Vec<Type> = operation.operand_types().split_off(BOUNDS);
    let results = operation.result_types();
    if results.len() != carried.len() {
        return Err(format!(
            "'{}' must produce one result per carried value, expected {}, got {}",
            operation.name(),
            carried.len(),
            results.len()
        ));
    }
    for (result, carried) in results.iter().zip(carried.iter()) {
        if result != carried {
            return Err(format!(
                "'{}' result must match its carried value, expected {carried}, got {result}",
                operation.name()
            ));
        }
    }
    if let Some(region) = operation.region(0) {
        if let Some(entry) = region.rd().entry() {
            if let Some(induction) = entry.rd().argument(0) {
                let typ = induction.rd().typ();
                if typ != Type::Index {
                    return Err(format!(
                        "'{}' induction variable must be index, got {typ}",
                        operation.name()
                    ));
                }
            }
            verify_body_yield(operation, &entry, &carried)?;
        }
    }
    Ok(())
}

/// The body must end in a yield returning the carried values.
fn verify_body_yield(
    operation: &Operation,
    entry: &Shared<crate::ir::Block>,
    carried: &[Type],
) -> std::result::Result<(), String> {
    let last = match entry.rd().ops().last() {
        Some(last) => last.clone(),
        None => {
            return Err(format!("'{}' body must end with '{YIELD}'", operation.name()));
        }
    };
    if !last.rd().name().is(YIELD) {
        return Err(format!("'{}' body must end with '{YIELD}'", operation.name()));
    }
    let yielded = last.rd().operand_types();
    if yielded != carried {
        return Err(format!(
            "'{}' must yield its carried value types, expected ({}), got ({})",
            operation.name(),
            carried
                .iter()
                .map(|typ| typ.to_string())
                .collect::<Vec<String>>()
                .join(", "),
            yielded
                .iter()
                .map(|typ| typ.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        ));
    }
    Ok(())
}

/// Build a detached `scf.for` over `[lower, upper)` with step `step`,
/// carrying `init` into the loop.
///
/// The body region gets an entry block declaring the induction variable and
/// one argument per carried value; the caller fills the body and ends it
/// with [yield_op].
pub fn for_op(
    lower: &Shared<Value>,
    upper: &Shared<Value>,
    step: &Shared<Value>,
    init: Vec<Shared<Value>>,
) -> Shared<Operation> {
    let result_types: Vec<Type> = init.iter().map(|value| value.rd().typ()).collect();
    let body = Shared::new(Region::new().into());
    let entry = body.add_block();
    entry.add_argument(Type::Index);
    for typ in result_types.iter() {
        entry.add_argument(typ.clone());
    }
    OperationBuilder::new(FOR)
        .operand(lower)
        .operand(upper)
        .operand(step)
        .operands(init)
        .results(result_types)
        .region(body)
        .build()
}

/// Build a detached `scf.yield` returning `values` to the enclosing loop.
pub fn yield_op(values: Vec<Shared<Value>>) -> Shared<Operation> {
    OperationBuilder::new(YIELD).operands(values).build()
}
