//! Built-in dialects.
//!
//! These are ordinary clients of the schema framework: each one registers
//! its operation kinds through the same [crate::schema::DialectRegistry]
//! API an external dialect would use.

pub mod arith;
pub mod builtin;
pub mod scf;

pub use arith::Arith;
pub use builtin::Builtin;
pub use scf::Scf;

use crate::schema::DialectRegistry;
use std::sync::Arc;

/// A registry holding all built-in dialects.
pub fn default_registry() -> Arc<DialectRegistry> {
    let mut registry = DialectRegistry::new();
    registry
        .register(&Builtin)
        .expect("builtin dialect registration");
    registry.register(&Arith).expect("arith dialect registration");
    registry.register(&Scf).expect("scf dialect registration");
    Arc::new(registry)
}
