//! ssakit is a toolkit for building your own SSA-based compiler IR.
//!
//! Say you are writing a compiler or an optimizing DSL and you need an
//! intermediate representation: operations producing typed values, nested
//! regions for structured control flow, verification that programs are
//! well formed, and rewrite passes that transform programs. You could build
//! all of that from scratch, but most of it is the same machinery every
//! time. This crate provides that machinery once, and lets you plug in the
//! part that is actually yours: the instruction set.
//!
//! A dialect declares its operations as data (typed operand, result,
//! attribute, and region slots with constraints) and registers them in a
//! [schema::DialectRegistry]. From then on the generic infrastructure does
//! the rest:
//!
//! - the [ir] module stores programs as a graph of operations, blocks, and
//!   regions with exact use-def bookkeeping,
//! - the [verifier] checks instances against their schemas and the graph
//!   against the structural rules (dominance, terminators, block-argument
//!   typing),
//! - the [rewrite] engine matches declarative patterns and applies
//!   localized mutations to fixpoint while keeping the graph consistent,
//! - the [frontend] round-trips programs through a generic textual format.
//!
//! The built-in [dialect]s (`builtin`, `arith`, `scf`) are small clients of
//! the same machinery and double as executable documentation for writing
//! your own.

pub mod canonicalize;
pub mod dialect;
pub mod error;
pub mod frontend;
pub mod ir;
mod pass;
pub mod rewrite;
pub mod schema;
pub mod shared;
#[cfg(feature = "test-utils")]
pub mod tester;
pub mod verifier;

pub use error::IrError;
pub use pass::default_arguments;
pub use pass::init_subscriber;
pub use pass::transform;
pub use pass::Canonicalize;
pub use pass::DefaultPassDispatch;
pub use pass::Pass;
pub use pass::PassDispatch;
pub use pass::Passes;
pub use pass::SinglePass;
pub use pass::VerifyPass;
pub use schema::Dialect;
