use crate::ir::Type;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// An attribute containing an integer value together with its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerAttr {
    value: i64,
    typ: Type,
}

impl IntegerAttr {
    pub fn new(value: i64, typ: Type) -> Self {
        Self { value, typ }
    }
    pub fn value(&self) -> i64 {
        self.value
    }
    pub fn typ(&self) -> &Type {
        &self.typ
    }
}

impl Display for IntegerAttr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.value, self.typ)
    }
}

/// A UTF-8 string attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringAttr {
    value: String,
}

impl StringAttr {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for StringAttr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", crate::ir::escape(&self.value))
    }
}

/// An immutable compile-time datum attached to operations or used to build
/// types.
///
/// Attributes are compared structurally and never participate in use-def
/// tracking. The variant set is closed; dialects compose their own kinds out
/// of [Attribute::Parametrized] plus the collection variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    /// A typed integer constant, e.g. `42 : i8`.
    Integer(IntegerAttr),
    /// A string constant, e.g. `"hello"`.
    Str(StringAttr),
    /// A type used as a datum, e.g. the element type of a container.
    Typed(Type),
    /// An ordered collection, e.g. `[1 : i8, 2 : i8]`.
    Array(Vec<Attribute>),
    /// A keyed collection with insertion order preserved.
    Dict(Vec<(String, Attribute)>),
    /// A dialect attribute kind carrying nested parameters, e.g.
    /// `#range<0 : i8, 8 : i8>`.
    Parametrized {
        name: String,
        params: Vec<Attribute>,
    },
}

impl Attribute {
    pub fn int(value: i64, typ: Type) -> Attribute {
        Attribute::Integer(IntegerAttr::new(value, typ))
    }
    pub fn string(value: impl Into<String>) -> Attribute {
        Attribute::Str(StringAttr::new(value))
    }
    pub fn as_integer(&self) -> Option<&IntegerAttr> {
        match self {
            Attribute::Integer(attr) => Some(attr),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::Str(attr) => Some(attr.value()),
            _ => None,
        }
    }
    /// A short description of the attribute's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Attribute::Integer(_) => "integer",
            Attribute::Str(_) => "string",
            Attribute::Typed(_) => "type",
            Attribute::Array(_) => "array",
            Attribute::Dict(_) => "dictionary",
            Attribute::Parametrized { .. } => "parametrized",
        }
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Integer(attr) => write!(f, "{attr}"),
            Attribute::Str(attr) => write!(f, "{attr}"),
            Attribute::Typed(typ) => write!(f, "{typ}"),
            Attribute::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| item.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "[{joined}]")
            }
            Attribute::Dict(entries) => {
                let joined = entries
                    .iter()
                    .map(|(key, value)| format!("\"{key}\" = {value}"))
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "{{{joined}}}")
            }
            Attribute::Parametrized { name, params } => {
                write!(f, "#{name}")?;
                if !params.is_empty() {
                    let joined = params
                        .iter()
                        .map(|param| param.to_string())
                        .collect::<Vec<String>>()
                        .join(", ");
                    write!(f, "<{joined}>")?;
                }
                Ok(())
            }
        }
    }
}

/// The attribute map of an operation.
///
/// Entries keep insertion order so that printing is deterministic; lookups go
/// by name. Inserting an existing name replaces the previous entry in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, Attribute)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, name: &str, attribute: Attribute) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = attribute,
            None => self.entries.push((name.to_string(), attribute)),
        }
    }
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }
}

impl Display for Attributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self
            .entries
            .iter()
            .map(|(key, value)| format!("\"{key}\" = {value}"))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{{{joined}}}")
    }
}
