use crate::ir::ModuleOp;
use crate::schema::Dialect;
use crate::schema::DialectRegistry;
use crate::schema::OpSchema;
use crate::schema::RegionKind;
use anyhow::Result;

/// The dialect holding the root container.
pub struct Builtin;

impl Dialect for Builtin {
    fn name(&self) -> &'static str {
        "builtin"
    }
    fn description(&self) -> &'static str {
        "Core operations every program needs, such as the module container"
    }
    fn register_ops(&self, registry: &mut DialectRegistry) -> Result<()> {
        registry.insert(OpSchema::new(ModuleOp::NAME).region("body", RegionKind::SingleBlock))
    }
}
