//! Error taxonomy shared by conversion and translation.

use crate::ast::Operator;
use crate::converter::ConversionError;
use crate::parser::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EqlError {
    /// Lexical or grammatical failure, with position information.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Illegal field: {0}")]
    IllegalField(String),

    #[error("Illegal operator {operator:?} for property: {property}")]
    IllegalOperator { property: String, operator: Operator },

    #[error("Illegal value {value} for operator {operator:?} on property: {property}")]
    IllegalValue {
        property: String,
        operator: Operator,
        value: String,
    },

    #[error("Illegal function: {0}")]
    IllegalFunction(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Translation of {condition} exceeded {limit} nested rewrites")]
    RecursionLimit { condition: String, limit: usize },

    #[error("Query nesting exceeds {limit} levels")]
    NestingLimit { limit: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EqlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        EqlError::Configuration(message.into())
    }
}
