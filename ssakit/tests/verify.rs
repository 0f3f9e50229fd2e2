extern crate ssakit;

use indoc::indoc;
use ssakit::dialect;
use ssakit::dialect::arith;
use ssakit::dialect::scf;
use ssakit::frontend::Parser;
use ssakit::ir::BlockExt;
use ssakit::ir::ModuleOp;
use ssakit::ir::OperationBuilder;
use ssakit::ir::RegionExt;
use ssakit::ir::Region;
use ssakit::ir::Type;
use ssakit::schema::Cardinality;
use ssakit::schema::DialectRegistry;
use ssakit::schema::OpSchema;
use ssakit::schema::RegionKind;
use ssakit::schema::TypeConstraint;
use ssakit::shared::Shared;
use ssakit::shared::SharedExt;
use ssakit::verifier::Verifier;
use ssakit::IrError;

/// A registry with the builtin dialect plus a few test kinds.
fn test_registry() -> DialectRegistry {
    let mut registry = DialectRegistry::new();
    registry.register(&dialect::Builtin).unwrap();
    registry
        .insert(
            OpSchema::new("test.promote")
                .operand(
                    "value",
                    Cardinality::One,
                    TypeConstraint::Exactly(Type::Integer(8)),
                )
                .result("result", Cardinality::One, TypeConstraint::IntegerLike),
        )
        .unwrap();
    registry
        .insert(OpSchema::new("test.func").region("body", RegionKind::ControlFlow))
        .unwrap();
    registry.insert(OpSchema::new("test.br").terminator()).unwrap();
    registry.insert(OpSchema::new("test.done")).unwrap();
    registry
}

fn expect_ir_error(err: anyhow::Error) -> IrError {
    err.downcast_ref::<IrError>()
        .unwrap_or_else(|| panic!("expected an IrError, got: {err}"))
        .clone()
}

#[test]
fn schema_constraint_names_slot() {
    let registry = test_registry();

    let module = ModuleOp::new();
    let body = module.body();
    let good = body.add_argument(Type::Integer(8));
    let op = OperationBuilder::new("test.promote")
        .operand(&good)
        .result(Type::Integer(16))
        .build();
    body.push_op(op);
    Verifier::new(&registry).verify(module.operation()).unwrap();

    let module = ModuleOp::new();
    let body = module.body();
    let bad = body.add_argument(Type::Index);
    let op = OperationBuilder::new("test.promote")
        .operand(&bad)
        .result(Type::Integer(16))
        .build();
    body.push_op(op);
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert!(matches!(err, IrError::SchemaMismatch(_)));
    assert_eq!(
        err.message(),
        "Operand #0 (value) of 'test.promote' has wrong type, expected i8, got index"
    );
}

#[test]
fn schema_operand_count() {
    let registry = test_registry();
    let module = ModuleOp::new();
    let op = OperationBuilder::new("test.promote")
        .result(Type::Integer(16))
        .build();
    module.body().push_op(op);
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert_eq!(err.message(), "'test.promote' expected 1 operands, got 0");
}

#[test]
fn unregistered_kind_fails() {
    let registry = test_registry();
    let module = ModuleOp::new();
    module
        .body()
        .push_op(OperationBuilder::new("unknown.op").build());
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert_eq!(
        err.message(),
        "'unknown.op' is not registered with the dialect registry"
    );
}

#[test]
fn loop_block_argument_typing_mismatch() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 0 : index} : () -> index
      %1 = "arith.constant"() {"value" = 10 : index} : () -> index
      %2 = "arith.constant"() {"value" = 1 : index} : () -> index
      %3 = "arith.constant"() {"value" = 7 : i8} : () -> i8
      %4 = "scf.for"(%0, %1, %2, %3) ({
        ^bb0(%i : index, %carried : index):
          %5 = "arith.constant"() {"value" = 1 : i8} : () -> i8
          "scf.yield"(%5) : (i8) -> ()
      }) : (index, index, index, i8) -> i8
    }) : () -> ()
    "#};
    let registry = dialect::default_registry();
    let module = Parser::parse(src, &registry).unwrap();
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert!(matches!(err, IrError::StructuralViolation(_)));
    assert_eq!(
        err.message(),
        "Block arguments with wrong type, expected i8, got index"
    );
}

#[test]
fn loop_block_argument_typing_match() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 0 : index} : () -> index
      %1 = "arith.constant"() {"value" = 10 : index} : () -> index
      %2 = "arith.constant"() {"value" = 1 : index} : () -> index
      %3 = "arith.constant"() {"value" = 7 : i8} : () -> i8
      %4 = "scf.for"(%0, %1, %2, %3) ({
        ^bb0(%i : index, %carried : i8):
          "scf.yield"(%carried) : (i8) -> ()
      }) : (index, index, index, i8) -> i8
    }) : () -> ()
    "#};
    let registry = dialect::default_registry();
    let module = Parser::parse(src, &registry).unwrap();
    Verifier::new(&registry).verify(module.operation()).unwrap();
}

#[test]
fn misplaced_terminator() {
    let registry = dialect::default_registry();
    let module = ModuleOp::new();
    let body = module.body();
    body.push_op(scf::yield_op(vec![]));
    body.push_op(arith::constant(1, Type::Integer(8)));
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert_eq!(
        err.message(),
        "Terminator 'scf.yield' must be the last operation in its block"
    );
}

#[test]
fn successor_must_stay_in_region() {
    let registry = test_registry();

    // A branch to a sibling block is fine.
    let module = ModuleOp::new();
    let region: Shared<Region> = Shared::new(Region::new().into());
    let entry = region.add_block();
    let target = region.add_block();
    target.push_op(OperationBuilder::new("test.done").build());
    let branch = OperationBuilder::new("test.br").successor(&target).build();
    entry.push_op(branch);
    let func = OperationBuilder::new("test.func").region(region).build();
    module.body().push_op(func);
    Verifier::new(&registry).verify(module.operation()).unwrap();

    // A branch escaping to the module body is not.
    let module = ModuleOp::new();
    let region: Shared<Region> = Shared::new(Region::new().into());
    let entry = region.add_block();
    let branch = OperationBuilder::new("test.br")
        .successor(&module.body())
        .build();
    entry.push_op(branch);
    let func = OperationBuilder::new("test.func").region(region).build();
    module.body().push_op(func);
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert_eq!(
        err.message(),
        "Successor of 'test.br' is not a block of the enclosing region"
    );
}

#[test]
fn operand_must_dominate_use() {
    let registry = dialect::default_registry();
    let module = ModuleOp::new();
    let body = module.body();
    let def = arith::constant(1, Type::Integer(8));
    let sum = arith::addi(
        &def.rd().result(0).unwrap(),
        &def.rd().result(0).unwrap(),
        Type::Integer(8),
    );
    // The use comes first, so the constant does not dominate it.
    body.push_op(sum);
    body.push_op(def);
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert_eq!(
        err.message(),
        "Operand #0 of 'arith.addi' does not dominate its use"
    );
}

#[test]
fn custom_phase_runs_after_schema_phase() {
    let registry = dialect::default_registry();
    let module = ModuleOp::new();
    let body = module.body();
    let lhs = body.add_argument(Type::Integer(8));
    let rhs = body.add_argument(Type::Integer(8));
    let op = OperationBuilder::new("arith.addi")
        .operand(&lhs)
        .operand(&rhs)
        .result(Type::Integer(16))
        .build();
    body.push_op(op);
    let err = Verifier::new(&registry)
        .verify(module.operation())
        .unwrap_err();
    let err = expect_ir_error(err);
    assert!(matches!(err, IrError::SemanticVerificationFailure(_)));
    assert_eq!(
        err.message(),
        "'arith.addi' operand and result types must match, expected i16, got i8"
    );
}

#[test]
fn non_module_root_is_rejected() {
    let registry = dialect::default_registry();
    let op = arith::constant(1, Type::Integer(8));
    let err = Verifier::new(&registry).verify(&op).unwrap_err();
    let err = expect_ir_error(err);
    assert!(matches!(err, IrError::StructuralViolation(_)));
}
