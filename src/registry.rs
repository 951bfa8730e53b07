//! Property descriptors and the registry the translator resolves them from.

use crate::ast::{Condition, EqType, Expression, Order};
use crate::value::{PropertyType, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of a per-property rewrite hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Translate the condition as usual.
    Keep,
    /// Translate this expression instead of the condition.
    Replace(Expression<EqType>),
    /// Use this already translated expression as it is.
    Translated(Expression<Value>),
    /// Remove the condition from its parent.
    Drop,
}

/// Custom translation strategy attached to a property.
pub trait ConditionRewriter: Send + Sync {
    fn rewrite(&self, condition: &Condition<EqType>) -> Rewrite;
}

impl<F> ConditionRewriter for F
where
    F: Fn(&Condition<EqType>) -> Rewrite + Send + Sync,
{
    fn rewrite(&self, condition: &Condition<EqType>) -> Rewrite {
        self(condition)
    }
}

/// Everything the translator needs to know about a single property.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    translated_name: Option<String>,
    property_type: PropertyType,
    rewriter: Option<Arc<dyn ConditionRewriter>>,
    sort_order: Option<Order>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            translated_name: None,
            property_type,
            rewriter: None,
            sort_order: None,
        }
    }

    pub fn with_translated_name(self, translated_name: impl Into<String>) -> Self {
        Self {
            translated_name: Some(translated_name.into()),
            ..self
        }
    }

    pub fn with_rewriter(self, rewriter: impl ConditionRewriter + 'static) -> Self {
        Self {
            rewriter: Some(Arc::new(rewriter)),
            ..self
        }
    }

    /// Template applied when sorting on this property.
    pub fn with_sort_order(self, sort_order: Order) -> Self {
        Self {
            sort_order: Some(sort_order),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in the translated tree, defaults to the property name.
    pub fn translated_name(&self) -> &str {
        self.translated_name.as_deref().unwrap_or(&self.name)
    }

    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }

    pub fn rewriter(&self) -> Option<&dyn ConditionRewriter> {
        self.rewriter.as_deref()
    }

    pub fn sort_order(&self) -> Option<&Order> {
        self.sort_order.as_ref()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("translated_name", &self.translated_name)
            .field("property_type", &self.property_type)
            .field("rewriter", &self.rewriter.is_some())
            .field("sort_order", &self.sort_order)
            .finish()
    }
}

/// Lookup of property descriptors by exact, case-sensitive name.
pub trait PropertyRegistry: Send + Sync {
    fn property(&self, name: &str) -> Option<&PropertyDescriptor>;
}

/// In-memory registry for the properties of one entity type.
#[derive(Debug, Clone, Default)]
pub struct EntityPropertyRegistry {
    properties: HashMap<String, PropertyDescriptor>,
}

impl EntityPropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing one with the same name.
    pub fn register(&mut self, descriptor: PropertyDescriptor) -> &mut Self {
        self.properties
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    pub fn with(mut self, descriptor: PropertyDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

impl PropertyRegistry for EntityPropertyRegistry {
    fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }
}
