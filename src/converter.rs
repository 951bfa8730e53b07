//! Resolution of raw leaf values into typed values.
//!
//! Placeholders and literals are coerced through a [`ConversionService`]; function calls are
//! dispatched to the first [`FunctionHandler`] that accepts them. Handlers receive the converter
//! itself so nested calls such as `offset(startOfWeek(), '+1d')` resolve recursively.

use crate::ast::EqType;
use crate::error::EqlError;
use crate::functions::DateFunctions;
use crate::value::{PropertyType, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// The representation a textual value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Placeholder,
    Literal,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to convert {value} to {target}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: PropertyType,
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: &str, target: &PropertyType, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            target: target.clone(),
            reason: reason.into(),
        }
    }
}

/// Coercion rules for textual leaf values.
pub trait ConversionService: Send + Sync {
    fn can_convert(&self, source: SourceKind, target: &PropertyType) -> bool;

    fn convert(
        &self,
        text: &str,
        source: SourceKind,
        target: &PropertyType,
    ) -> Result<Value, ConversionError>;
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Plain text to every scalar type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConversionService;

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, source: SourceKind, target: &PropertyType) -> bool {
        source == SourceKind::Text && !target.is_collection()
    }

    fn convert(
        &self,
        text: &str,
        _source: SourceKind,
        target: &PropertyType,
    ) -> Result<Value, ConversionError> {
        let trimmed = text.trim();
        match target {
            PropertyType::Text | PropertyType::Entity(_) => Ok(Value::Text(text.to_string())),
            PropertyType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| ConversionError::new(text, target, e.to_string())),
            PropertyType::Decimal => trimmed
                .parse::<f64>()
                .map(Value::Decimal)
                .map_err(|e| ConversionError::new(text, target, e.to_string())),
            PropertyType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Value::Boolean(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Value::Boolean(false))
                } else {
                    Err(ConversionError::new(text, target, "expected true or false"))
                }
            }
            PropertyType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| ConversionError::new(text, target, e.to_string())),
            PropertyType::DateTime => parse_date_time(trimmed)
                .map(Value::DateTime)
                .ok_or_else(|| ConversionError::new(text, target, "unsupported date format")),
            PropertyType::Collection(_) | PropertyType::Array(_) => Err(ConversionError::new(
                text,
                target,
                "collections are converted per element",
            )),
        }
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Pluggable resolution of named function calls.
pub trait FunctionHandler: Send + Sync {
    fn accepts(&self, name: &str, target: &PropertyType) -> bool;

    /// Arguments are passed unresolved; use `converter` to resolve them against the type needed.
    fn apply(
        &self,
        name: &str,
        arguments: &[EqType],
        target: &PropertyType,
        converter: &TypeConverter,
    ) -> Result<Value, EqlError>;
}

#[derive(Clone)]
pub struct TypeConverter {
    conversion: Arc<dyn ConversionService>,
    functions: Vec<Arc<dyn FunctionHandler>>,
}

#[derive(Default)]
pub struct TypeConverterBuilder {
    conversion: Option<Arc<dyn ConversionService>>,
    functions: Vec<Arc<dyn FunctionHandler>>,
}

impl TypeConverterBuilder {
    pub fn conversion_service(mut self, service: impl ConversionService + 'static) -> Self {
        self.conversion = Some(Arc::new(service));
        self
    }

    /// Handlers are consulted in registration order.
    pub fn function_handler(mut self, handler: impl FunctionHandler + 'static) -> Self {
        self.functions.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<TypeConverter, EqlError> {
        let conversion = self
            .conversion
            .ok_or_else(|| EqlError::configuration("a conversion service is required"))?;
        Ok(TypeConverter {
            conversion,
            functions: self.functions,
        })
    }
}

impl TypeConverter {
    pub fn builder() -> TypeConverterBuilder {
        TypeConverterBuilder::default()
    }

    /// Default text coercion and the built-in date functions.
    pub fn with_defaults() -> Self {
        Self {
            conversion: Arc::new(DefaultConversionService),
            functions: vec![Arc::new(DateFunctions::default())],
        }
    }

    pub fn convert(&self, target: &PropertyType, value: &EqType) -> Result<Value, EqlError> {
        match value {
            EqType::Placeholder(_) if value.is_null() => Ok(Value::Null),
            EqType::Placeholder(raw) => {
                self.convert_text(target.element_type(), raw, SourceKind::Placeholder)
            }
            EqType::Literal(text) if target.element_type().is_text() => {
                Ok(Value::Text(text.clone()))
            }
            EqType::Literal(text) => {
                self.convert_text(target.element_type(), text, SourceKind::Literal)
            }
            EqType::Group(values) => {
                let element = target.element_type();
                values
                    .iter()
                    .map(|member| self.convert(element, member))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            EqType::FunctionCall { name, arguments } => {
                self.apply_function(name, arguments, target)
            }
        }
    }

    /// Converts each value against the element type of `target`. With `expand_groups`
    /// list results are flattened into the output.
    pub fn convert_all(
        &self,
        target: &PropertyType,
        expand_groups: bool,
        values: &[EqType],
    ) -> Result<Vec<Value>, EqlError> {
        let element = target.element_type();
        let mut converted = Vec::with_capacity(values.len());
        for value in values {
            match self.convert(element, value)? {
                Value::List(members) if expand_groups => converted.extend(members),
                other => converted.push(other),
            }
        }
        Ok(converted)
    }

    fn convert_text(
        &self,
        target: &PropertyType,
        text: &str,
        source: SourceKind,
    ) -> Result<Value, EqlError> {
        if self.conversion.can_convert(source, target) {
            return Ok(self.conversion.convert(text, source, target)?);
        }
        if target.is_text() {
            return Ok(Value::Text(text.to_string()));
        }
        if source != SourceKind::Text && self.conversion.can_convert(SourceKind::Text, target) {
            return Ok(self.conversion.convert(text, SourceKind::Text, target)?);
        }
        // no coercion available
        Ok(Value::Text(text.to_string()))
    }

    fn apply_function(
        &self,
        name: &str,
        arguments: &[EqType],
        target: &PropertyType,
    ) -> Result<Value, EqlError> {
        let handler = self
            .functions
            .iter()
            .find(|handler| handler.accepts(name, target))
            .ok_or_else(|| EqlError::IllegalFunction(name.to_string()))?;
        trace!(function = name, target = %target, "applying function handler");
        handler.apply(name, arguments, target, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> TypeConverter {
        TypeConverter::builder()
            .conversion_service(DefaultConversionService)
            .function_handler(Sum)
            .function_handler(Constant("first"))
            .function_handler(Constant("second"))
            .build()
            .unwrap()
    }

    /// `sum(a, b, ...)` resolves every argument as an integer through the converter.
    struct Sum;

    impl FunctionHandler for Sum {
        fn accepts(&self, name: &str, target: &PropertyType) -> bool {
            name == "sum" && *target == PropertyType::Integer
        }

        fn apply(
            &self,
            _name: &str,
            arguments: &[EqType],
            target: &PropertyType,
            converter: &TypeConverter,
        ) -> Result<Value, EqlError> {
            let mut total = 0;
            for value in converter.convert_all(target, true, arguments)? {
                match value {
                    Value::Integer(number) => total += number,
                    other => panic!("Expected integer, got {:?}", other),
                }
            }
            Ok(Value::Integer(total))
        }
    }

    struct Constant(&'static str);

    impl FunctionHandler for Constant {
        fn accepts(&self, name: &str, _target: &PropertyType) -> bool {
            name == "constant"
        }

        fn apply(
            &self,
            _name: &str,
            _arguments: &[EqType],
            _target: &PropertyType,
            _converter: &TypeConverter,
        ) -> Result<Value, EqlError> {
            Ok(Value::text(self.0))
        }
    }

    /// Only literals, always to 999.
    struct LiteralOnly;

    impl ConversionService for LiteralOnly {
        fn can_convert(&self, source: SourceKind, target: &PropertyType) -> bool {
            source == SourceKind::Literal && *target == PropertyType::Integer
        }

        fn convert(
            &self,
            _text: &str,
            _source: SourceKind,
            _target: &PropertyType,
        ) -> Result<Value, ConversionError> {
            Ok(Value::Integer(999))
        }
    }

    struct Nothing;

    impl ConversionService for Nothing {
        fn can_convert(&self, _source: SourceKind, _target: &PropertyType) -> bool {
            false
        }

        fn convert(
            &self,
            text: &str,
            _source: SourceKind,
            target: &PropertyType,
        ) -> Result<Value, ConversionError> {
            Err(ConversionError::new(text, target, "unsupported"))
        }
    }

    #[test]
    fn test_placeholder_coercion() {
        let converter = converter();
        assert_eq!(
            converter.convert(&PropertyType::Integer, &EqType::placeholder("123")).unwrap(),
            Value::Integer(123)
        );
        assert_eq!(
            converter.convert(&PropertyType::Boolean, &EqType::placeholder("TRUE")).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            converter.convert(&PropertyType::Text, &EqType::placeholder("john")).unwrap(),
            Value::text("john")
        );
        assert_eq!(
            converter.convert(&PropertyType::Integer, &EqType::null()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_literal_for_text_is_verbatim() {
        let converter = converter();
        assert_eq!(
            converter.convert(&PropertyType::Text, &EqType::literal(" 123 ")).unwrap(),
            Value::text(" 123 ")
        );
        assert_eq!(
            converter.convert(&PropertyType::Text, &EqType::literal("null")).unwrap(),
            Value::text("null")
        );
    }

    #[test]
    fn test_literal_uses_text_coercion() {
        let converter = converter();
        assert_eq!(
            converter.convert(&PropertyType::Integer, &EqType::literal("1234")).unwrap(),
            Value::Integer(1234)
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            converter.convert(&PropertyType::DateTime, &EqType::literal("2024-01-31 10:15")).unwrap(),
            Value::DateTime(date.and_hms_opt(10, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_exact_source_coercion_wins() {
        let converter = TypeConverter::builder()
            .conversion_service(LiteralOnly)
            .build()
            .unwrap();
        assert_eq!(
            converter.convert(&PropertyType::Integer, &EqType::literal("1")).unwrap(),
            Value::Integer(999)
        );
    }

    #[test]
    fn test_unconvertible_value_stays_text() {
        let converter = TypeConverter::builder()
            .conversion_service(Nothing)
            .build()
            .unwrap();
        assert_eq!(
            converter.convert(&PropertyType::Integer, &EqType::literal("abc")).unwrap(),
            Value::text("abc")
        );
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let converter = converter();
        let result = converter.convert(&PropertyType::Integer, &EqType::placeholder("abc"));
        if let Err(EqlError::Conversion(error)) = result {
            assert_eq!(error.value, "abc");
            assert_eq!(error.target, PropertyType::Integer);
        } else {
            panic!("Expected conversion error, got {:?}", result);
        }
    }

    #[test]
    fn test_group_converts_each_member() {
        let converter = converter();
        let group = EqType::group([EqType::placeholder("1"), EqType::literal("2"), EqType::null()]);
        assert_eq!(
            converter.convert(&PropertyType::Integer, &group).unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Null])
        );
        assert_eq!(
            converter
                .convert(&PropertyType::collection_of(PropertyType::Integer), &group)
                .unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Null])
        );
    }

    #[test]
    fn test_convert_all_expands_groups() {
        let converter = converter();
        let values = [
            EqType::placeholder("1"),
            EqType::group([EqType::placeholder("2"), EqType::placeholder("3")]),
        ];

        assert_eq!(
            converter.convert_all(&PropertyType::Integer, true, &values).unwrap(),
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
        assert_eq!(
            converter.convert_all(&PropertyType::Integer, false, &values).unwrap(),
            vec![
                Value::Integer(1),
                Value::List(vec![Value::Integer(2), Value::Integer(3)]),
            ]
        );
    }

    #[test]
    fn test_convert_all_uses_element_type() {
        let converter = converter();
        let target = PropertyType::collection_of(PropertyType::Integer);
        assert_eq!(
            converter.convert_all(&target, true, &[EqType::placeholder("7")]).unwrap(),
            vec![Value::Integer(7)]
        );
    }

    #[test]
    fn test_nested_function_calls() {
        let converter = converter();
        let call = EqType::function(
            "sum",
            [
                EqType::placeholder("1"),
                EqType::function("sum", [EqType::placeholder("2"), EqType::literal("3")]),
            ],
        );
        assert_eq!(
            converter.convert(&PropertyType::Integer, &call).unwrap(),
            Value::Integer(6)
        );
    }

    #[test]
    fn test_first_accepting_handler_wins() {
        let converter = converter();
        assert_eq!(
            converter
                .convert(&PropertyType::Text, &EqType::function("constant", []))
                .unwrap(),
            Value::text("first")
        );
    }

    #[test]
    fn test_unknown_function() {
        let converter = converter();
        let result = converter.convert(&PropertyType::Text, &EqType::function("unknown", []));
        assert_eq!(result, Err(EqlError::IllegalFunction("unknown".into())));

        // sum only accepts integer targets
        let result = converter.convert(&PropertyType::Text, &EqType::function("sum", []));
        assert_eq!(result, Err(EqlError::IllegalFunction("sum".into())));
    }

    #[test]
    fn test_conversion_service_is_required() {
        let result = TypeConverter::builder().function_handler(Sum).build();
        assert!(matches!(result, Err(EqlError::Configuration(_))));
    }
}
