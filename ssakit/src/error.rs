//! Failure taxonomy for verification, rewriting, and parsing.
//!
//! The rendered messages are an external contract: downstream tooling matches
//! on the diagnostic text, so [std::fmt::Display] prints the message verbatim
//! without any variant prefix.

use std::error::Error;
use std::fmt;

/// A structured failure raised by the IR core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    /// Generic-phase verification failure: wrong operand/result/attribute/
    /// region arity, or a value failing its declared slot constraint.
    SchemaMismatch(String),
    /// Custom-phase failure from an operation kind's own verifier.
    SemanticVerificationFailure(String),
    /// Block/region well-formedness failure: misplaced terminator, dangling
    /// successor, block-argument type mismatch, or a non-dominating operand.
    StructuralViolation(String),
    /// A pattern misused the mutation handle, for example by erasing a still
    /// used operation or supplying a mismatched replacement count.
    RewriteContractViolation(String),
    /// Malformed textual input or a reference to an undefined value.
    ParseFailure(String),
}

impl IrError {
    /// The diagnostic text, without variant decoration.
    pub fn message(&self) -> &str {
        match self {
            IrError::SchemaMismatch(msg) => msg,
            IrError::SemanticVerificationFailure(msg) => msg,
            IrError::StructuralViolation(msg) => msg,
            IrError::RewriteContractViolation(msg) => msg,
            IrError::ParseFailure(msg) => msg,
        }
    }
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for IrError {}
