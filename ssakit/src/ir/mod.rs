//! The SSA graph data model.
//!
//! Operations, blocks, and regions form a strict ownership tree with the
//! module operation at the root. Values flow between operations as
//! [Shared] references, and every value keeps an exact use list so that
//! consumers can be enumerated and rewired in O(uses).

mod attribute;
mod block;
mod module;
mod operation;
mod region;
mod typ;
mod value;

pub use attribute::Attribute;
pub use attribute::Attributes;
pub use attribute::IntegerAttr;
pub use attribute::StringAttr;
pub use block::Block;
pub use block::BlockExt;
pub use block::BlockName;
pub use module::ModuleOp;
pub use operation::OpName;
pub use operation::Operation;
pub use operation::OperationBuilder;
pub use operation::OperationExt;
pub use region::Region;
pub use region::RegionExt;
pub use typ::Type;
pub use value::replace_all_uses;
pub use value::BlockArgument;
pub use value::OpResult;
pub use value::Use;
pub use value::Value;

use crate::shared::Shared;
use crate::shared::SharedExt;
use std::collections::HashMap;
use std::sync::Arc;

pub fn spaces(indent: usize) -> String {
    "  ".repeat(indent)
}

pub fn escape(src: &str) -> String {
    src.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

pub fn unescape(src: &str) -> String {
    src.replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

#[derive(Default)]
struct EqContext {
    values_a: HashMap<usize, usize>,
    values_b: HashMap<usize, usize>,
    blocks_a: HashMap<usize, usize>,
    blocks_b: HashMap<usize, usize>,
}

fn serial<T>(map: &mut HashMap<usize, usize>, node: &Shared<T>) -> usize {
    let key = Arc::as_ptr(node) as usize;
    let next = map.len();
    *map.entry(key).or_insert(next)
}

/// Whether two graphs have the same operation kinds, attribute maps, value
/// wiring, and nesting.
///
/// Identity is compared up to a consistent renumbering of values and blocks,
/// which is exactly what survives a print/parse round trip.
pub fn structurally_equal(a: &Shared<Operation>, b: &Shared<Operation>) -> bool {
    let mut context = EqContext::default();
    eq_op(a, b, &mut context)
}

fn eq_op(a: &Shared<Operation>, b: &Shared<Operation>, context: &mut EqContext) -> bool {
    let a = a.rd();
    let b = b.rd();
    if a.name() != b.name() || a.attributes() != b.attributes() {
        return false;
    }
    let operands_a = a.operands();
    let operands_b = b.operands();
    if operands_a.len() != operands_b.len() {
        return false;
    }
    for (operand_a, operand_b) in operands_a.iter().zip(operands_b.iter()) {
        if operand_a.rd().typ() != operand_b.rd().typ() {
            return false;
        }
        let id_a = serial(&mut context.values_a, operand_a);
        let id_b = serial(&mut context.values_b, operand_b);
        if id_a != id_b {
            return false;
        }
    }
    let results_a = a.results();
    let results_b = b.results();
    if results_a.len() != results_b.len() {
        return false;
    }
    for (result_a, result_b) in results_a.iter().zip(results_b.iter()) {
        if result_a.rd().typ() != result_b.rd().typ() {
            return false;
        }
        if serial(&mut context.values_a, result_a) != serial(&mut context.values_b, result_b) {
            return false;
        }
    }
    let successors_a = a.successors();
    let successors_b = b.successors();
    if a.num_successors() != b.num_successors() || successors_a.len() != successors_b.len() {
        return false;
    }
    for (successor_a, successor_b) in successors_a.iter().zip(successors_b.iter()) {
        if serial(&mut context.blocks_a, successor_a) != serial(&mut context.blocks_b, successor_b)
        {
            return false;
        }
    }
    let regions_a = a.regions();
    let regions_b = b.regions();
    if regions_a.len() != regions_b.len() {
        return false;
    }
    for (region_a, region_b) in regions_a.iter().zip(regions_b.iter()) {
        if !eq_region(region_a, region_b, context) {
            return false;
        }
    }
    true
}

fn eq_region(a: &Shared<Region>, b: &Shared<Region>, context: &mut EqContext) -> bool {
    let blocks_a = a.rd().blocks();
    let blocks_b = b.rd().blocks();
    if blocks_a.len() != blocks_b.len() {
        return false;
    }
    // Register blocks and arguments up front so that forward successor
    // references compare correctly.
    for (block_a, block_b) in blocks_a.iter().zip(blocks_b.iter()) {
        if serial(&mut context.blocks_a, block_a) != serial(&mut context.blocks_b, block_b) {
            return false;
        }
        let arguments_a = block_a.rd().arguments();
        let arguments_b = block_b.rd().arguments();
        if arguments_a.len() != arguments_b.len() {
            return false;
        }
        for (argument_a, argument_b) in arguments_a.iter().zip(arguments_b.iter()) {
            if argument_a.rd().typ() != argument_b.rd().typ() {
                return false;
            }
            if serial(&mut context.values_a, argument_a)
                != serial(&mut context.values_b, argument_b)
            {
                return false;
            }
        }
    }
    for (block_a, block_b) in blocks_a.iter().zip(blocks_b.iter()) {
        let ops_a = block_a.rd().ops();
        let ops_b = block_b.rd().ops();
        if ops_a.len() != ops_b.len() {
            return false;
        }
        for (op_a, op_b) in ops_a.iter().zip(ops_b.iter()) {
            if !eq_op(op_a, op_b, context) {
                return false;
            }
        }
    }
    true
}
