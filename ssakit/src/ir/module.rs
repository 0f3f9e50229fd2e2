use crate::error::IrError;
use crate::ir::Block;
use crate::ir::Operation;
use crate::ir::OperationBuilder;
use crate::ir::Region;
use crate::ir::RegionExt;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// The root container of a program.
///
/// A module is a `builtin.module` operation with one single-block region and
/// no operands, results, or attributes. It is the only legal top-level
/// operation; everything else lives in its body.
pub struct ModuleOp {
    operation: Shared<Operation>,
}

impl ModuleOp {
    pub const NAME: &'static str = "builtin.module";

    /// Create an empty module with one entry block.
    pub fn new() -> Self {
        let region = Shared::new(Region::new().into());
        region.add_block();
        let operation = OperationBuilder::new(Self::NAME).region(region).build();
        Self { operation }
    }
    /// Wrap an existing operation, checking that it is a module.
    pub fn from_operation(operation: Shared<Operation>) -> Result<Self> {
        let name = operation.rd().name().clone();
        if !name.is(Self::NAME) {
            return Err(IrError::StructuralViolation(format!(
                "Expected {} as the top-level operation, got '{}'",
                Self::NAME,
                name
            ))
            .into());
        }
        Ok(Self { operation })
    }
    pub fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    /// The block holding the module's top-level operations.
    pub fn body(&self) -> Shared<Block> {
        let region = self
            .operation
            .rd()
            .region(0)
            .expect("module without a region");
        let entry = region.rd().entry();
        entry.expect("module region without a block")
    }
    /// The first top-level operation, if any.
    pub fn first_op(&self) -> Option<Shared<Operation>> {
        self.body().rd().op(0)
    }
}

impl Default for ModuleOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ModuleOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation.rd())
    }
}

impl fmt::Debug for ModuleOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleOp({})", self.operation.rd())
    }
}
