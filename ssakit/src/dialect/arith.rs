//! Integer arithmetic on SSA values.

use crate::ir::Attribute;
use crate::ir::Operation;
use crate::ir::OperationBuilder;
use crate::ir::Type;
use crate::ir::Value;
use crate::schema::AttrConstraint;
use crate::schema::Cardinality;
use crate::schema::Dialect;
use crate::schema::DialectRegistry;
use crate::schema::OpSchema;
use crate::schema::TypeConstraint;
use crate::shared::Shared;
use anyhow::Result;

pub const CONSTANT: &str = "arith.constant";
pub const ADDI: &str = "arith.addi";
pub const SUBI: &str = "arith.subi";

pub struct Arith;

impl Dialect for Arith {
    fn name(&self) -> &'static str {
        "arith"
    }
    fn description(&self) -> &'static str {
        "Integer constants and two's complement integer arithmetic"
    }
    fn register_ops(&self, registry: &mut DialectRegistry) -> Result<()> {
        registry.insert(
            OpSchema::new(CONSTANT)
                .result(
                    "value",
                    Cardinality::One,
                    TypeConstraint::Predicate {
                        description: "an integer or index type",
                        check: integer_or_index,
                    },
                )
                .attribute("value", AttrConstraint::IntegerLike)
                .pure()
                .custom_verify(verify_constant),
        )?;
        registry.insert(binary_schema(ADDI))?;
        registry.insert(binary_schema(SUBI))?;
        Ok(())
    }
}

fn integer_or_index(typ: &Type) -> bool {
    typ.is_integer() || *typ == Type::Index
}

fn binary_schema(name: &'static str) -> OpSchema {
    OpSchema::new(name)
        .operand("lhs", Cardinality::One, TypeConstraint::IntegerLike)
        .operand("rhs", Cardinality::One, TypeConstraint::IntegerLike)
        .result("result", Cardinality::One, TypeConstraint::IntegerLike)
        .pure()
        .custom_verify(verify_binary)
}

/// The result type must equal the type carried by the `value` attribute.
fn verify_constant(operation: &Operation) -> std::result::Result<(), String> {
    let value = operation
        .attribute("value")
        .and_then(Attribute::as_integer)
        .cloned()
        .expect("schema guarantees an integer value attribute");
    let result = operation.result_types().remove(0);
    if *value.typ() != result {
        return Err(format!(
            "'{}' result type must match its value, expected {}, got {result}",
            operation.name(),
            value.typ()
        ));
    }
    Ok(())
}

/// Both operands and the result must share one integer type.
fn verify_binary(operation: &Operation) -> std::result::Result<(), String> {
    let types = operation.operand_types();
    let result = operation.result_types().remove(0);
    for typ in types {
        if typ != result {
            return Err(format!(
                "'{}' operand and result types must match, expected {result}, got {typ}",
                operation.name()
            ));
        }
    }
    Ok(())
}

/// Build a detached `arith.constant` producing `value` of type `typ`.
pub fn constant(value: i64, typ: Type) -> Shared<Operation> {
    OperationBuilder::new(CONSTANT)
        .attribute("value", Attribute::int(value, typ.clone()))
        .result(typ)
        .build()
}

/// Build a detached `arith.addi` of two values of type `typ`.
pub fn addi(lhs: &Shared<Value>, rhs: &Shared<Value>, typ: Type) -> Shared<Operation> {
    OperationBuilder::new(ADDI)
        .operand(lhs)
        .operand(rhs)
        .result(typ)
        .build()
}

/// Build a detached `arith.subi` of two values of type `typ`.
pub fn subi(lhs: &Shared<Value>, rhs: &Shared<Value>, typ: Type) -> Shared<Operation> {
    OperationBuilder::new(SUBI)
        .operand(lhs)
        .operand(rhs)
        .result(typ)
        .build()
}
