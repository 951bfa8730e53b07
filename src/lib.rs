//! Entity Query Language (EQL): a small textual filter language for entity collections.
//!
//! ```text
//! name = 'john' and (city in ('brussel', NULL) or created >= startOfWeek()) order by name asc
//! ```
//!
//! The pipeline is `lexer` → `parser` (raw tree of [`ast::EqType`] leaves) → `translator`
//! (typed tree of [`value::Value`] leaves). [`entity_query::EntityQueryParser`] runs all stages;
//! [`sql_compiler::SqlCompiler`] renders a typed tree as PostgreSQL.

pub mod ast;
pub mod config;
pub mod converter;
pub mod entity_query;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod metadata;
pub mod parser;
pub mod period;
pub mod registry;
pub mod rewrite;
pub mod sql_compiler;
pub mod token;
pub mod translator;
pub mod utils;
pub mod value;

pub use ast::{
    Combinator, Condition, Direction, EqType, Expression, NullHandling, Operator, Order, Query,
    QueryBuilder, RawQuery, Sort,
};
pub use entity_query::EntityQueryParser;
pub use error::EqlError;
pub use parser::{parse, ParseError, ParseErrorKind};
pub use translator::Translator;
pub use value::{PropertyType, TypedQuery, Value};
