//! Test utilities, available behind the `test-utils` feature.

use crate::dialect::default_registry;
use crate::frontend::Parser;
use crate::ir::ModuleOp;
use crate::pass::transform;
use crate::pass::DefaultPassDispatch;
use crate::pass::Passes;
use crate::verifier::Verifier;
use std::cmp::max;
use std::panic::Location;
use tracing::info;

pub struct Tester;

impl Tester {
    /// Initialize the subscriber for the tests.
    ///
    /// Cannot take options, since the tests run concurrently.
    pub fn init_tracing() {
        let level = tracing::Level::INFO;
        match crate::pass::init_subscriber(level) {
            Ok(_) => (),
            Err(_e) => (),
        }
    }
    fn print_heading(msg: &str, src: &str) {
        info!("{msg}:\n```\n{src}\n```\n");
    }
    /// Parse `src` with the built-in dialects and verify the result.
    pub fn parse(src: &str) -> (ModuleOp, String) {
        let src = src.trim();
        Self::print_heading("Before parse", src);
        let registry = default_registry();
        let module = Parser::parse(src, &registry).unwrap();
        Verifier::new(&registry)
            .verify(module.operation())
            .unwrap();
        let actual = module.to_string();
        Self::print_heading("After parse", &actual);
        (module, actual)
    }
    /// Parse `src`, run the given pass flags, and return the new text.
    pub fn transform(arguments: Vec<&str>, src: &str) -> (ModuleOp, String) {
        let src = src.trim();
        let registry = default_registry();
        let module = Parser::parse(src, &registry).unwrap();
        let msg = format!("Before (transform {arguments:?})");
        Self::print_heading(&msg, src);
        for arg in arguments.iter() {
            assert!(
                arg.starts_with("--"),
                "pass flags should be prefixed with `--`"
            );
        }
        let passes = Passes::from_flags(&arguments);
        transform::<DefaultPassDispatch>(module.operation(), &passes, &registry).unwrap();
        let actual = module.to_string();
        let msg = format!("After (transform {arguments:?})");
        Self::print_heading(&msg, &actual);
        (module, actual)
    }
    /// Verify a module against the built-in dialects.
    pub fn verify(module: &ModuleOp) {
        let registry = default_registry();
        Verifier::new(&registry)
            .verify(module.operation())
            .unwrap();
    }
    pub fn check_lines_exact(actual: &str, expected: &str, caller: &Location<'_>) {
        let actual = actual.trim();
        let expected = expected.trim();
        let count = max(actual.lines().count(), expected.lines().count());
        for i in 0..count {
            let actual_line = match actual.lines().nth(i) {
                None => panic!("Line {i} missing from output: called from {caller}"),
                Some(line) => line,
            };
            let expected_line = match expected.lines().nth(i) {
                None => panic!("Unexpected extra line {i} in output: called from {caller}"),
                Some(line) => line,
            };
            assert_eq!(actual_line, expected_line, "called from {caller}");
        }
    }
    /// Check whether the expected lines are present in the actual output.
    ///
    /// The actual output may contain additional lines.
    pub fn check_lines_contain(actual: &str, expected: &str, caller: &Location<'_>) {
        let actual = actual.trim();
        let expected = expected.trim();
        let mut actual_index = 0;
        'outer: for i in 0..expected.lines().count() {
            let expected_line = expected.lines().nth(i).unwrap().trim();
            // An empty expected line would match any line and hide a real
            // mismatch on the next one.
            if expected_line.is_empty() {
                continue;
            }
            let start = actual_index;
            for j in start..actual.lines().count() {
                let actual_line = actual.lines().nth(j).unwrap();
                if actual_line.contains(expected_line) {
                    actual_index = j + 1;
                    continue 'outer;
                }
            }
            panic!("Missing line `{expected_line}` in output:\n{actual}\nwhen called from {caller}");
        }
    }
}
