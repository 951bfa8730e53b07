//! Single entry point from EQL text to a typed query.

use crate::ast::RawQuery;
use crate::converter::TypeConverter;
use crate::error::EqlError;
use crate::parser;
use crate::registry::PropertyRegistry;
use crate::translator::Translator;
use crate::value::TypedQuery;
use std::sync::Arc;

/// Tokenizes, converts and translates in that order.
#[derive(Clone)]
pub struct EntityQueryParser {
    translator: Translator,
}

impl EntityQueryParser {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }

    /// Parser over `registry` with the default type converter and date functions.
    pub fn for_registry(registry: Arc<dyn PropertyRegistry>) -> Result<Self, EqlError> {
        let translator = Translator::builder()
            .property_registry(registry)
            .type_converter(TypeConverter::with_defaults())
            .build()?;
        Ok(Self::new(translator))
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn parse(&self, eql: &str) -> Result<TypedQuery, EqlError> {
        let raw = self.parse_raw(eql)?;
        self.prepare(&raw)
    }

    /// Converted but untranslated tree, no properties are resolved.
    pub fn parse_raw(&self, eql: &str) -> Result<RawQuery, EqlError> {
        Ok(parser::parse(eql)?)
    }

    /// Translates a query that was built in code.
    pub fn prepare(&self, query: &RawQuery) -> Result<TypedQuery, EqlError> {
        self.translator.translate(query)
    }
}
