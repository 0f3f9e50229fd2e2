extern crate ssakit;

use indoc::indoc;
use ssakit::ir::ModuleOp;
use ssakit::shared::SharedExt;
use ssakit::tester::Tester;
use std::panic::Location;

fn flags() -> Vec<&'static str> {
    vec!["--canonicalize", "--verify"]
}

fn constant_users(module: &ModuleOp, index: usize) -> usize {
    let ops = module.body().rd().ops();
    let op = ops[index].rd();
    let result = op.result(0).unwrap();
    let uses = result.rd().uses().len();
    uses
}

#[test]
fn determine_users() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 1 : i64} : () -> i64
      %1 = "arith.constant"() {"value" = 2 : i64} : () -> i64
      "scf.yield"(%1) : (i64) -> ()
    }) : () -> ()
    "#};
    let (module, _actual) = Tester::parse(src);
    assert_eq!(constant_users(&module, 0), 0);
    assert_eq!(constant_users(&module, 1), 1);
}

#[test]
fn fold_addi_chain() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 1 : i64} : () -> i64
      %1 = "arith.constant"() {"value" = 2 : i64} : () -> i64
      %2 = "arith.addi"(%0, %1) : (i64, i64) -> i64
      %3 = "arith.addi"(%2, %2) : (i64, i64) -> i64
      "scf.yield"(%3) : (i64) -> ()
    }) : () -> ()
    "#};
    let expected = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 6 : i64} : () -> i64
      "scf.yield"(%0) : (i64) -> ()
    }) : () -> ()
    "#};
    Tester::init_tracing();
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(&module);
    Tester::check_lines_exact(&actual, expected, Location::caller());
}

#[test]
fn dead_values_are_swept() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 1 : i64} : () -> i64
      %1 = "arith.constant"() {"value" = 2 : i64} : () -> i64
      %2 = "arith.addi"(%0, %1) : (i64, i64) -> i64
    }) : () -> ()
    "#};
    let expected = indoc! {r#"
    "builtin.module"() ({
    }) : () -> ()
    "#};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(&module);
    Tester::check_lines_exact(&actual, expected, Location::caller());
    assert_eq!(module.body().rd().num_ops(), 0);
}

#[test]
fn folding_stops_at_non_constants() {
    let src = indoc! {r#"
    "builtin.module"() ({
      %0 = "arith.constant"() {"value" = 0 : index} : () -> index
      %1 = "arith.constant"() {"value" = 4 : index} : () -> index
      %2 = "arith.constant"() {"value" = 1 : index} : () -> index
      %3 = "arith.constant"() {"value" = 0 : i64} : () -> i64
      %4 = "scf.for"(%0, %1, %2, %3) ({
        ^bb0(%i : index, %acc : i64):
          %5 = "arith.constant"() {"value" = 2 : i64} : () -> i64
          %6 = "arith.addi"(%acc, %5) : (i64, i64) -> i64
          "scf.yield"(%6) : (i64) -> ()
      }) : (index, index, index, i64) -> i64
    }) : () -> ()
    "#};
    // `%acc` is a block argument, not a constant, so the add must survive.
    let (_module, actual) = Tester::transform(vec!["--canonicalize"], src);
    assert!(actual.contains("arith.addi"));
}
