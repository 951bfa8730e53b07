//! Validation of properties, operators and raw values against the property schema.

use crate::ast::{EqType, Operator};
use crate::registry::PropertyRegistry;
use crate::value::PropertyType;
use std::sync::Arc;

/// Schema oracle consulted before a condition is translated.
pub trait MetadataProvider: Send + Sync {
    fn is_valid_property(&self, property: &str) -> bool;

    fn is_valid_operator_for_property(&self, operator: Operator, property: &str) -> bool;

    /// `value` is `None` for operators without arguments.
    fn is_valid_value_for_property_and_operator(
        &self,
        value: Option<&EqType>,
        property: &str,
        operator: Operator,
    ) -> bool;
}

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::In,
    Operator::NotIn,
    Operator::Contains,
    Operator::NotContains,
    Operator::Like,
    Operator::LikeIc,
    Operator::NotLike,
    Operator::NotLikeIc,
    Operator::IsNull,
    Operator::IsNotNull,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const ORDERED_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::In,
    Operator::NotIn,
    Operator::Gt,
    Operator::Ge,
    Operator::Lt,
    Operator::Le,
    Operator::IsNull,
    Operator::IsNotNull,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const EQUALITY_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const COLLECTION_OPERATORS: &[Operator] = &[
    Operator::Contains,
    Operator::NotContains,
    Operator::IsNull,
    Operator::IsNotNull,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

/// Operators allowed for a property of the given type.
pub fn operators_for(property_type: &PropertyType) -> &'static [Operator] {
    match property_type {
        PropertyType::Text => TEXT_OPERATORS,
        PropertyType::Integer
        | PropertyType::Decimal
        | PropertyType::Date
        | PropertyType::DateTime => ORDERED_OPERATORS,
        PropertyType::Boolean | PropertyType::Entity(_) => EQUALITY_OPERATORS,
        PropertyType::Collection(_) | PropertyType::Array(_) => COLLECTION_OPERATORS,
    }
}

/// A group counts only when it holds at least one value, directly or in a nested group.
fn has_members(value: &EqType) -> bool {
    match value {
        EqType::Group(values) => values.iter().any(has_members),
        _ => true,
    }
}

/// Metadata derived from the property types in a registry.
#[derive(Clone)]
pub struct DefaultMetadataProvider {
    registry: Arc<dyn PropertyRegistry>,
}

impl DefaultMetadataProvider {
    pub fn new(registry: Arc<dyn PropertyRegistry>) -> Self {
        Self { registry }
    }
}

impl MetadataProvider for DefaultMetadataProvider {
    fn is_valid_property(&self, property: &str) -> bool {
        self.registry.property(property).is_some()
    }

    fn is_valid_operator_for_property(&self, operator: Operator, property: &str) -> bool {
        self.registry
            .property(property)
            .is_some_and(|descriptor| operators_for(descriptor.property_type()).contains(&operator))
    }

    fn is_valid_value_for_property_and_operator(
        &self,
        value: Option<&EqType>,
        _property: &str,
        operator: Operator,
    ) -> bool {
        if operator.is_null_check() {
            return value.is_none();
        }
        match value {
            None => false,
            // functions resolve to whatever the target needs
            Some(EqType::FunctionCall { .. }) => true,
            Some(group @ EqType::Group(_)) => {
                has_members(group)
                    && matches!(
                        operator,
                        Operator::In | Operator::NotIn | Operator::Contains | Operator::NotContains
                    )
            }
            Some(EqType::Placeholder(_) | EqType::Literal(_)) => !operator.is_multi_value(),
        }
    }
}
