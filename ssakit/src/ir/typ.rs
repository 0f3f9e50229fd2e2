use crate::ir::Attribute;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// Compile-time classification of a value.
///
/// Types are immutable and structurally comparable: two types with the same
/// variant and the same parameters are equal. Dialects introduce their own
/// type kinds through the [Type::Parametrized] variant rather than a type
/// hierarchy; constraints over such kinds are expressed in the operation
/// schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// A signless integer type such as `i1` or `i64`.
    Integer(u64),
    /// The platform-width integer used for sizes and loop bounds.
    Index,
    /// A function type, e.g. `(i8, i8) -> i8`.
    Function {
        inputs: Vec<Type>,
        results: Vec<Type>,
    },
    /// A dialect type kind carrying attribute parameters, e.g.
    /// `!tensor<[2, 2], i8>`.
    Parametrized {
        name: String,
        params: Vec<Attribute>,
    },
}

impl Type {
    /// Shorthand for the `i1` type.
    pub fn bool() -> Type {
        Type::Integer(1)
    }
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer(_))
    }
    /// The kind name of a parametrized type, `None` for core variants.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Type::Parametrized { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer(bits) => write!(f, "i{bits}"),
            Type::Index => write!(f, "index"),
            Type::Function { inputs, results } => {
                write!(f, "({})", join(inputs))?;
                match results.len() {
                    1 => write!(f, " -> {}", results[0]),
                    _ => write!(f, " -> ({})", join(results)),
                }
            }
            Type::Parametrized { name, params } => {
                write!(f, "!{name}")?;
                if !params.is_empty() {
                    write!(f, "<{}>", join(params))?;
                }
                Ok(())
            }
        }
    }
}
