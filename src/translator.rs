//! Translation of raw query trees into typed, executable trees.
//!
//! Per condition the translator validates the raw condition against the [`MetadataProvider`],
//! resolves the [`PropertyDescriptor`], runs the property's rewrite hook, applies the built-in
//! rewrites from [`crate::rewrite`], renames the property and converts its arguments through the
//! [`TypeConverter`]. Rewritten expressions are translated again, up to [`MAX_REWRITE_DEPTH`]
//! levels; only conditions written by the caller (depth 0) are validated.
//!
//! [`PropertyDescriptor`]: crate::registry::PropertyDescriptor

use crate::ast::{
    Condition, Direction, EqType, Expression, NullHandling, Operator, Order, QueryBuilder, RawQuery,
    Sort, MAX_NESTING_DEPTH,
};
use crate::converter::TypeConverter;
use crate::error::EqlError;
use crate::metadata::{DefaultMetadataProvider, MetadataProvider};
use crate::registry::{PropertyRegistry, Rewrite};
use crate::rewrite;
use crate::value::{TypedQuery, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, trace};

/// Nested rewrites allowed for a single condition.
pub const MAX_REWRITE_DEPTH: usize = 50;

type Translated = Option<Expression<Value>>;

#[derive(Clone)]
pub struct Translator {
    registry: Arc<dyn PropertyRegistry>,
    metadata: Arc<dyn MetadataProvider>,
    converter: TypeConverter,
}

/// Collaborators are checked in [`TranslatorBuilder::build`], not on first use.
#[derive(Default)]
pub struct TranslatorBuilder {
    registry: Option<Arc<dyn PropertyRegistry>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    converter: Option<TypeConverter>,
}

impl TranslatorBuilder {
    pub fn property_registry(mut self, registry: Arc<dyn PropertyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to a [`DefaultMetadataProvider`] over the property registry.
    pub fn metadata_provider(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn type_converter(mut self, converter: TypeConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn build(self) -> Result<Translator, EqlError> {
        let registry = self
            .registry
            .ok_or_else(|| EqlError::configuration("a property registry is required"))?;
        let converter = self
            .converter
            .ok_or_else(|| EqlError::configuration("a type converter is required"))?;
        let metadata = self.metadata.unwrap_or_else(|| {
            Arc::new(DefaultMetadataProvider::new(Arc::clone(&registry)))
        });
        Ok(Translator {
            registry,
            metadata,
            converter,
        })
    }
}

impl Translator {
    pub fn builder() -> TranslatorBuilder {
        TranslatorBuilder::default()
    }

    pub fn converter(&self) -> &TypeConverter {
        &self.converter
    }

    pub fn translate(&self, query: &RawQuery) -> Result<TypedQuery, EqlError> {
        debug!(query = %query, "translating query");
        let translated = self.translate_query(query, 0, 0)?;
        debug!(query = %translated, "translated query");
        Ok(translated)
    }

    /// `depth` counts rewrites, `nesting` counts enclosing queries.
    fn translate_query(
        &self,
        query: &RawQuery,
        depth: usize,
        nesting: usize,
    ) -> Result<TypedQuery, EqlError> {
        if nesting > MAX_NESTING_DEPTH {
            return Err(EqlError::NestingLimit {
                limit: MAX_NESTING_DEPTH,
            });
        }
        let mut builder = QueryBuilder::new(query.combinator());
        // the query's own sort wins over sorts hoisted from nested queries
        if let Some(sort) = query.sort() {
            builder.sort(self.translate_sort(sort));
        }
        for expression in query.expressions() {
            if let Some(translated) = self.translate_expression(expression, depth, nesting)? {
                builder.add(translated);
            }
        }
        Ok(builder.build())
    }

    fn translate_expression(
        &self,
        expression: &Expression<EqType>,
        depth: usize,
        nesting: usize,
    ) -> Result<Translated, EqlError> {
        match expression {
            Expression::Condition(condition) => self.translate_condition(condition, depth, nesting),
            Expression::Query(query) => {
                Ok(Some(self.translate_query(query, depth, nesting + 1)?.into()))
            }
        }
    }

    fn translate_condition(
        &self,
        condition: &Condition,
        depth: usize,
        nesting: usize,
    ) -> Result<Translated, EqlError> {
        if depth >= MAX_REWRITE_DEPTH {
            return Err(EqlError::RecursionLimit {
                condition: condition.to_string(),
                limit: MAX_REWRITE_DEPTH,
            });
        }
        if depth == 0 {
            self.validate(condition)?;
        }

        let descriptor = self
            .registry
            .property(condition.property())
            .ok_or_else(|| EqlError::IllegalField(condition.property().to_string()))?;

        if let Some(rewriter) = descriptor.rewriter() {
            match rewriter.rewrite(condition) {
                Rewrite::Keep => {}
                Rewrite::Replace(replacement) => {
                    trace!(condition = %condition, replacement = %replacement, "rewrite hook replaced condition");
                    return self.translate_expression(&replacement, depth + 1, nesting);
                }
                Rewrite::Translated(translated) => {
                    trace!(condition = %condition, translated = %translated, "rewrite hook translated condition");
                    return Ok(Some(translated));
                }
                Rewrite::Drop => {
                    debug!(condition = %condition, "rewrite hook dropped condition");
                    return Ok(None);
                }
            }
        }

        let property_type = descriptor.property_type();
        let expanded = rewrite::expand_contains(condition)
            .or_else(|| rewrite::expand_in_null(condition))
            .or_else(|| {
                property_type
                    .is_text()
                    .then(|| rewrite::text_emptiness(condition))
                    .flatten()
            });
        if let Some(expanded) = expanded {
            trace!(condition = %condition, expanded = %expanded, "expanded condition");
            return self.translate_expression(&expanded, depth + 1, nesting);
        }

        let operator = match condition.operator() {
            Operator::IsEmpty if !property_type.is_collection() => Operator::IsNull,
            Operator::IsNotEmpty if !property_type.is_collection() => Operator::IsNotNull,
            operator => operator,
        };
        let arguments = if operator.is_null_check() {
            Vec::new()
        } else {
            self.converter
                .convert_all(property_type, true, condition.arguments())?
        };
        if arguments.is_empty() && !operator.is_null_check() {
            return Err(EqlError::IllegalValue {
                property: condition.property().to_string(),
                operator,
                value: EqType::Group(condition.arguments().to_vec()).to_string(),
            });
        }

        let translated = Condition::new(descriptor.translated_name(), operator, arguments);
        let translated = if property_type.is_text() {
            rewrite::text_contains_to_like(translated)
        } else {
            translated
        };
        Ok(Some(translated.into()))
    }

    fn validate(&self, condition: &Condition) -> Result<(), EqlError> {
        let property = condition.property();
        let operator = condition.operator();

        if !self.metadata.is_valid_property(property) {
            return Err(EqlError::IllegalField(property.to_string()));
        }
        if !self.metadata.is_valid_operator_for_property(operator, property) {
            return Err(EqlError::IllegalOperator {
                property: property.to_string(),
                operator,
            });
        }

        let value: Option<Cow<'_, EqType>> = match condition.arguments() {
            [] => None,
            [single] => Some(Cow::Borrowed(single)),
            many => Some(Cow::Owned(EqType::Group(many.to_vec()))),
        };
        if !self
            .metadata
            .is_valid_value_for_property_and_operator(value.as_deref(), property, operator)
        {
            return Err(EqlError::IllegalValue {
                property: property.to_string(),
                operator,
                value: value.map_or_else(|| "NULL".to_string(), |value| value.to_string()),
            });
        }
        Ok(())
    }

    /// Applies the sort templates of the properties. Orders on properties without a template are
    /// kept as requested.
    pub fn translate_sort(&self, sort: &Sort) -> Sort {
        Sort::new(sort.orders().iter().map(|order| self.translate_order(order)))
    }

    fn translate_order(&self, order: &Order) -> Order {
        let Some(template) = self
            .registry
            .property(order.property())
            .and_then(|descriptor| descriptor.sort_order())
        else {
            return order.clone();
        };

        let null_handling = match (template.null_handling(), order.direction()) {
            (NullHandling::Native, Direction::Asc) => NullHandling::NullsFirst,
            (NullHandling::Native, Direction::Desc) => NullHandling::NullsLast,
            (explicit, _) => explicit,
        };
        let translated = Order::new(template.property(), order.direction())
            .with_null_handling(null_handling);
        if template.is_ignore_case() {
            translated.ignoring_case()
        } else {
            translated
        }
    }
}
