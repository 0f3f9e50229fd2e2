//! Operation shape contracts and the dialect registry.
//!
//! A dialect declares, per operation kind, the typed slots its instances must
//! fill. The registry maps kind identifiers to these [OpSchema]s; operations
//! themselves stay generic and all kind-driven behavior is looked up here.

use crate::ir::Attribute;
use crate::ir::OpName;
use crate::ir::Operation;
use crate::ir::Type;
use anyhow::Result;
use std::collections::HashMap;

/// How many elements a slot accepts.
///
/// A slot list may contain at most one [Cardinality::Variadic] slot so that
/// element-to-slot resolution stays unambiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one element.
    One,
    /// Zero or one element.
    Optional,
    /// Zero or more elements.
    Variadic,
}

/// A predicate over the type filling an operand or result slot.
#[derive(Clone)]
pub enum TypeConstraint {
    Any,
    /// The type must equal the given type.
    Exactly(Type),
    /// Any [Type::Integer].
    IntegerLike,
    /// Some instance of the parametrized kind with the given name.
    Kind(&'static str),
    /// An arbitrary predicate; `description` is used in diagnostics.
    Predicate {
        description: &'static str,
        check: fn(&Type) -> bool,
    },
}

impl TypeConstraint {
    pub fn check(&self, typ: &Type) -> bool {
        match self {
            TypeConstraint::Any => true,
            TypeConstraint::Exactly(expected) => typ == expected,
            TypeConstraint::IntegerLike => typ.is_integer(),
            TypeConstraint::Kind(name) => typ.kind() == Some(name),
            TypeConstraint::Predicate { check, .. } => check(typ),
        }
    }
    /// What the constraint expects, phrased for an expected-vs-got message.
    pub fn describe(&self) -> String {
        match self {
            TypeConstraint::Any => "any type".to_string(),
            TypeConstraint::Exactly(expected) => expected.to_string(),
            TypeConstraint::IntegerLike => "an integer type".to_string(),
            TypeConstraint::Kind(name) => format!("an instance of !{name}"),
            TypeConstraint::Predicate { description, .. } => description.to_string(),
        }
    }
}

/// A predicate over the attribute filling an attribute slot.
#[derive(Clone)]
pub enum AttrConstraint {
    Any,
    /// Any [Attribute::Integer].
    IntegerLike,
    /// Any [Attribute::Str].
    StringLike,
    /// An arbitrary predicate; `description` is used in diagnostics.
    Predicate {
        description: &'static str,
        check: fn(&Attribute) -> bool,
    },
}

impl AttrConstraint {
    pub fn check(&self, attribute: &Attribute) -> bool {
        match self {
            AttrConstraint::Any => true,
            AttrConstraint::IntegerLike => matches!(attribute, Attribute::Integer(_)),
            AttrConstraint::StringLike => matches!(attribute, Attribute::Str(_)),
            AttrConstraint::Predicate { check, .. } => check(attribute),
        }
    }
    pub fn describe(&self) -> String {
        match self {
            AttrConstraint::Any => "any attribute".to_string(),
            AttrConstraint::IntegerLike => "an integer attribute".to_string(),
            AttrConstraint::StringLike => "a string attribute".to_string(),
            AttrConstraint::Predicate { description, .. } => description.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OperandSlot {
    pub name: &'static str,
    pub cardinality: Cardinality,
    pub constraint: TypeConstraint,
}

#[derive(Clone)]
pub struct ResultSlot {
    pub name: &'static str,
    pub cardinality: Cardinality,
    pub constraint: TypeConstraint,
}

#[derive(Clone)]
pub struct AttributeSlot {
    pub name: &'static str,
    pub required: bool,
    pub constraint: AttrConstraint,
}

/// What a region owned by an operation may contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Exactly one block, no internal control flow.
    SingleBlock,
    /// One or more blocks connected by terminator successors.
    ControlFlow,
}

#[derive(Clone)]
pub struct RegionSlot {
    pub name: &'static str,
    pub kind: RegionKind,
}

/// Ties a region's entry-block arguments to a suffix of the operation's
/// operands.
///
/// The entry block of region `region` must declare `leading_args` arguments
/// (e.g. an induction variable) followed by one argument per operand from
/// `skip_operands` onward, with exactly matching types.
#[derive(Clone, Copy)]
pub struct CarriedArgs {
    pub region: usize,
    pub skip_operands: usize,
    pub leading_args: usize,
}

/// An operation kind's own extra verifier, run after the generic phase.
pub type CustomVerifyFn = fn(&Operation) -> std::result::Result<(), String>;

/// The static contract over an operation kind's shape.
#[derive(Clone)]
pub struct OpSchema {
    name: OpName,
    operands: Vec<OperandSlot>,
    results: Vec<ResultSlot>,
    attributes: Vec<AttributeSlot>,
    regions: Vec<RegionSlot>,
    terminator: bool,
    pure: bool,
    carried_block_args: Option<CarriedArgs>,
    custom_verify: Option<CustomVerifyFn>,
}

impl OpSchema {
    pub fn new(name: impl Into<OpName>) -> Self {
        Self {
            name: name.into(),
            operands: vec![],
            results: vec![],
            attributes: vec![],
            regions: vec![],
            terminator: false,
            pure: false,
            carried_block_args: None,
            custom_verify: None,
        }
    }
    pub fn operand(
        mut self,
        name: &'static str,
        cardinality: Cardinality,
        constraint: TypeConstraint,
    ) -> Self {
        self.operands.push(OperandSlot {
            name,
            cardinality,
            constraint,
        });
        self
    }
    pub fn result(
        mut self,
        name: &'static str,
        cardinality: Cardinality,
        constraint: TypeConstraint,
    ) -> Self {
        self.results.push(ResultSlot {
            name,
            cardinality,
            constraint,
        });
        self
    }
    pub fn attribute(mut self, name: &'static str, constraint: AttrConstraint) -> Self {
        self.attributes.push(AttributeSlot {
            name,
            required: true,
            constraint,
        });
        self
    }
    pub fn optional_attribute(mut self, name: &'static str, constraint: AttrConstraint) -> Self {
        self.attributes.push(AttributeSlot {
            name,
            required: false,
            constraint,
        });
        self
    }
    pub fn region(mut self, name: &'static str, kind: RegionKind) -> Self {
        self.regions.push(RegionSlot { name, kind });
        self
    }
    pub fn terminator(mut self) -> Self {
        self.terminator = true;
        self
    }
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }
    pub fn carried_block_args(mut self, carried: CarriedArgs) -> Self {
        self.carried_block_args = Some(carried);
        self
    }
    pub fn custom_verify(mut self, verify: CustomVerifyFn) -> Self {
        self.custom_verify = Some(verify);
        self
    }
    pub fn name(&self) -> &OpName {
        &self.name
    }
    pub fn operand_slots(&self) -> &[OperandSlot] {
        &self.operands
    }
    pub fn result_slots(&self) -> &[ResultSlot] {
        &self.results
    }
    pub fn attribute_slots(&self) -> &[AttributeSlot] {
        &self.attributes
    }
    pub fn region_slots(&self) -> &[RegionSlot] {
        &self.regions
    }
    pub fn is_terminator(&self) -> bool {
        self.terminator
    }
    pub fn is_pure(&self) -> bool {
        self.pure
    }
    pub fn carried(&self) -> Option<&CarriedArgs> {
        self.carried_block_args.as_ref()
    }
    pub fn custom(&self) -> Option<CustomVerifyFn> {
        self.custom_verify
    }
}

/// Resolve a list of `actual` elements onto the declared slots.
///
/// `One` slots take one element each, `Optional` slots fill greedily left to
/// right while surplus elements remain, and the single `Variadic` slot takes
/// the rest. Returns the governing slot per element, or `None` when the
/// count cannot be resolved.
pub(crate) fn assign_slots<S>(
    slots: &[S],
    cardinality_of: impl Fn(&S) -> Cardinality,
    actual: usize,
) -> Option<Vec<&S>> {
    let ones = slots
        .iter()
        .filter(|&slot| cardinality_of(slot) == Cardinality::One)
        .count();
    let optionals = slots
        .iter()
        .filter(|&slot| cardinality_of(slot) == Cardinality::Optional)
        .count();
    let has_variadic = slots
        .iter()
        .any(|slot| cardinality_of(slot) == Cardinality::Variadic);
    if actual < ones {
        return None;
    }
    let extra = actual - ones;
    if !has_variadic && extra > optionals {
        return None;
    }
    let mut optional_fills = extra.min(optionals);
    let variadic_take = extra - optional_fills;
    let mut out = Vec::with_capacity(actual);
    for slot in slots.iter() {
        match cardinality_of(slot) {
            Cardinality::One => out.push(slot),
            Cardinality::Optional => {
                if optional_fills > 0 {
                    optional_fills -= 1;
                    out.push(slot);
                }
            }
            Cardinality::Variadic => {
                for _ in 0..variadic_take {
                    out.push(slot);
                }
            }
        }
    }
    Some(out)
}

/// The expected count, phrased for an expected-vs-got message.
pub(crate) fn expected_count<S>(slots: &[S], cardinality_of: impl Fn(&S) -> Cardinality) -> String {
    let ones = slots
        .iter()
        .filter(|&slot| cardinality_of(slot) == Cardinality::One)
        .count();
    let optionals = slots
        .iter()
        .filter(|&slot| cardinality_of(slot) == Cardinality::Optional)
        .count();
    let has_variadic = slots
        .iter()
        .any(|slot| cardinality_of(slot) == Cardinality::Variadic);
    if has_variadic {
        format!("at least {ones}")
    } else if optionals > 0 {
        format!("between {} and {}", ones, ones + optionals)
    } else {
        ones.to_string()
    }
}

/// A namespaced set of operation kinds registered together.
pub trait Dialect {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Insert this dialect's schemas into the registry.
    fn register_ops(&self, registry: &mut DialectRegistry) -> Result<()>;
}

/// Maps operation kind identifiers to their schemas.
///
/// The registry is consulted for all schema-driven behavior; an operation
/// whose kind is not registered fails verification.
#[derive(Default)]
pub struct DialectRegistry {
    schemas: HashMap<OpName, OpSchema>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register(&mut self, dialect: &dyn Dialect) -> Result<()> {
        dialect.register_ops(self)
    }
    pub fn insert(&mut self, schema: OpSchema) -> Result<()> {
        let variadic_operands = schema
            .operand_slots()
            .iter()
            .filter(|slot| slot.cardinality == Cardinality::Variadic)
            .count();
        let variadic_results = schema
            .result_slots()
            .iter()
            .filter(|slot| slot.cardinality == Cardinality::Variadic)
            .count();
        if variadic_operands > 1 || variadic_results > 1 {
            anyhow::bail!(
                "Schema for '{}' declares more than one variadic slot in a list",
                schema.name()
            );
        }
        if self.schemas.contains_key(schema.name()) {
            anyhow::bail!("Schema for '{}' is already registered", schema.name());
        }
        self.schemas.insert(schema.name().clone(), schema);
        Ok(())
    }
    pub fn get(&self, name: &OpName) -> Option<&OpSchema> {
        self.schemas.get(name)
    }
    /// Run the two verification phases on a single operation instance.
    pub fn verify_operation(&self, operation: &Operation) -> Result<()> {
        crate::verifier::verify_operation(self, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cardinalities(cards: &[Cardinality]) -> Vec<OperandSlot> {
        cards
            .iter()
            .map(|cardinality| OperandSlot {
                name: "x",
                cardinality: *cardinality,
                constraint: TypeConstraint::Any,
            })
            .collect()
    }

    #[test]
    fn assign_fixed() {
        let slots = cardinalities(&[Cardinality::One, Cardinality::One]);
        assert!(assign_slots(&slots, |slot| slot.cardinality, 1).is_none());
        assert_eq!(
            assign_slots(&slots, |slot| slot.cardinality, 2).unwrap().len(),
            2
        );
        assert!(assign_slots(&slots, |slot| slot.cardinality, 3).is_none());
    }

    #[test]
    fn assign_variadic() {
        let slots = cardinalities(&[Cardinality::One, Cardinality::Variadic]);
        let assigned = assign_slots(&slots, |slot| slot.cardinality, 4).unwrap();
        assert_eq!(assigned.len(), 4);
        assert_eq!(
            assign_slots(&slots, |slot| slot.cardinality, 1).unwrap().len(),
            1
        );
    }

    #[test]
    fn assign_optional_before_variadic() {
        let slots = cardinalities(&[
            Cardinality::One,
            Cardinality::Optional,
            Cardinality::Variadic,
        ]);
        // One element beyond the fixed slot goes to the optional first.
        let assigned = assign_slots(&slots, |slot| slot.cardinality, 2).unwrap();
        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[1].cardinality, Cardinality::Optional);
    }

    #[test]
    fn expected_count_description() {
        let slots = cardinalities(&[Cardinality::One, Cardinality::One]);
        assert_eq!(expected_count(&slots, |slot| slot.cardinality), "2");
        let slots = cardinalities(&[Cardinality::One, Cardinality::Variadic]);
        assert_eq!(expected_count(&slots, |slot| slot.cardinality), "at least 1");
        let slots = cardinalities(&[Cardinality::One, Cardinality::Optional]);
        assert_eq!(
            expected_count(&slots, |slot| slot.cardinality),
            "between 1 and 2"
        );
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = DialectRegistry::new();
        registry.insert(OpSchema::new("test.op")).unwrap();
        assert!(registry.insert(OpSchema::new("test.op")).is_err());
    }
}
