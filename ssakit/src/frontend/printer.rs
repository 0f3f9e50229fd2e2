use crate::ir::spaces;
use crate::ir::Block;
use crate::ir::Operation;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// Renders a graph in the generic textual format.
///
/// Value and block names are generated fresh on every print (`%0`, `%1`, …
/// and `^bb0`, `^bb1`, …): rewrites may duplicate or drop parsed names, so
/// identities live in the graph and names only exist on the way out.
#[derive(Default)]
pub struct Printer {
    value_names: HashMap<usize, String>,
    block_labels: HashMap<usize, String>,
    next_value: usize,
    next_block: usize,
}

fn key<T>(node: &Shared<T>) -> usize {
    Arc::as_ptr(node) as usize
}

impl Printer {
    /// Print the graph rooted at `op`.
    pub fn print(op: &Operation) -> String {
        let mut printer = Printer::default();
        let mut out = String::new();
        printer.print_op(&mut out, op, 0);
        out
    }
    fn value_name(&mut self, value: &Shared<Value>) -> String {
        let next = &mut self.next_value;
        self.value_names
            .entry(key(value))
            .or_insert_with(|| {
                let name = format!("%{next}");
                *next += 1;
                name
            })
            .clone()
    }
    fn block_label(&mut self, block: &Shared<Block>) -> String {
        let next = &mut self.next_block;
        self.block_labels
            .entry(key(block))
            .or_insert_with(|| {
                let label = format!("^bb{next}");
                *next += 1;
                label
            })
            .clone()
    }
    fn result_types(types: &[Type]) -> String {
        match types {
            [single] => single.to_string(),
            types => {
                let joined = types
                    .iter()
                    .map(|typ| typ.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("({joined})")
            }
        }
    }
    fn print_op(&mut self, out: &mut String, op: &Operation, indent: usize) {
        out.push_str(&spaces(indent));
        let results = op.results();
        if !results.is_empty() {
            let names = results
                .iter()
                .map(|result| self.value_name(result))
                .collect::<Vec<String>>()
                .join(", ");
            out.push_str(&names);
            out.push_str(" = ");
        }
        out.push_str(&format!("\"{}\"", op.name()));
        let operands = op.operands();
        let names = operands
            .iter()
            .map(|operand| self.value_name(operand))
            .collect::<Vec<String>>()
            .join(", ");
        out.push_str(&format!("({names})"));
        let successors = op.successors();
        if !successors.is_empty() {
            let labels = successors
                .iter()
                .map(|successor| self.block_label(successor))
                .collect::<Vec<String>>()
                .join(", ");
            out.push_str(&format!("[{labels}]"));
        }
        let regions = op.regions();
        if !regions.is_empty() {
            out.push_str(" (");
            for (index, region) in regions.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                self.print_region(out, region, indent);
            }
            out.push(')');
        }
        if !op.attributes().is_empty() {
            out.push_str(&format!(" {}", op.attributes()));
        }
        let operand_types = op
            .operand_types()
            .iter()
            .map(|typ| typ.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        out.push_str(&format!(
            " : ({operand_types}) -> {}",
            Self::result_types(&op.result_types())
        ));
    }
    fn print_region(&mut self, out: &mut String, region: &Shared<Region>, indent: usize) {
        out.push_str("{\n");
        let blocks = region.rd().blocks();
        // Assign labels up front so forward branches print resolved labels.
        // A single-block region still needs its label when something
        // branches to it.
        let has_branches = blocks.iter().any(|block| {
            block
                .rd()
                .ops()
                .iter()
                .any(|op| op.rd().num_successors() > 0)
        });
        let labeled = blocks.len() > 1 || has_branches;
        for block in blocks.iter() {
            if labeled || block.rd().num_arguments() > 0 {
                self.block_label(block);
            }
        }
        for block in blocks.iter() {
            let arguments = block.rd().arguments();
            if labeled || !arguments.is_empty() {
                let label = self.block_label(block);
                let arguments = arguments
                    .iter()
                    .map(|argument| {
                        format!("{} : {}", self.value_name(argument), argument.rd().typ())
                    })
                    .collect::<Vec<String>>()
                    .join(", ");
                out.push_str(&spaces(indent + 1));
                if arguments.is_empty() {
                    out.push_str(&format!("{label}:\n"));
                } else {
                    out.push_str(&format!("{label}({arguments}):\n"));
                }
            }
            for op in block.rd().ops() {
                self.print_op(out, &op.rd(), indent + 1);
                out.push('\n');
            }
        }
        out.push_str(&spaces(indent));
        out.push('}');
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Printer::print(self))
    }
}
