//! Typed values and the type descriptors they are resolved against.

use crate::ast::{quote, Argument, Query};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target type of a property. Collections and arrays carry their element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    /// Reference to another entity, identified by its id.
    Entity(String),
    Collection(Box<PropertyType>),
    Array(Box<PropertyType>),
}

impl PropertyType {
    pub fn collection_of(element: PropertyType) -> Self {
        PropertyType::Collection(Box::new(element))
    }

    pub fn array_of(element: PropertyType) -> Self {
        PropertyType::Array(Box::new(element))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PropertyType::Text)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyType::Collection(_) | PropertyType::Array(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, PropertyType::Date | PropertyType::DateTime)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PropertyType::Integer | PropertyType::Decimal)
    }

    /// Element type for collections, the type itself otherwise.
    pub fn element_type(&self) -> &PropertyType {
        match self {
            PropertyType::Collection(element) | PropertyType::Array(element) => element,
            other => other,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Text => f.write_str("text"),
            PropertyType::Integer => f.write_str("integer"),
            PropertyType::Decimal => f.write_str("decimal"),
            PropertyType::Boolean => f.write_str("boolean"),
            PropertyType::Date => f.write_str("date"),
            PropertyType::DateTime => f.write_str("date_time"),
            PropertyType::Entity(name) => write!(f, "entity<{}>", name),
            PropertyType::Collection(element) => write!(f, "collection<{}>", element),
            PropertyType::Array(element) => write!(f, "array<{}>", element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown property type: {0}")]
pub struct UnknownPropertyType(pub String);

/// Parses the rendered form, e.g. `integer`, `entity<user>` or `collection<text>`.
impl FromStr for PropertyType {
    type Err = UnknownPropertyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parameter = |name: &str| {
            trimmed
                .strip_prefix(name)
                .and_then(|rest| rest.trim_start().strip_prefix('<'))
                .and_then(|rest| rest.strip_suffix('>'))
                .map(str::trim)
        };

        if let Some(element) = parameter("collection") {
            return Ok(PropertyType::collection_of(element.parse()?));
        }
        if let Some(element) = parameter("array") {
            return Ok(PropertyType::array_of(element.parse()?));
        }
        if let Some(entity) = parameter("entity").filter(|entity| !entity.is_empty()) {
            return Ok(PropertyType::Entity(entity.to_string()));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(PropertyType::Text),
            "integer" | "long" => Ok(PropertyType::Integer),
            "decimal" | "double" => Ok(PropertyType::Decimal),
            "boolean" => Ok(PropertyType::Boolean),
            "date" => Ok(PropertyType::Date),
            "date_time" | "datetime" => Ok(PropertyType::DateTime),
            _ => Err(UnknownPropertyType(s.to_string())),
        }
    }
}

/// A resolved condition argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
}

/// Translated, executable query tree.
pub type TypedQuery = Query<Value>;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Argument for Value {
    fn is_group(&self) -> bool {
        matches!(self, Value::List(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(text) => f.write_str(&quote(text)),
            Value::Integer(number) => write!(f, "{}", number),
            Value::Decimal(number) => write!(f, "{}", number),
            Value::Boolean(flag) => write!(f, "{}", flag),
            Value::Date(date) => f.write_str(&quote(&date.format("%Y-%m-%d").to_string())),
            Value::DateTime(date_time) => {
                f.write_str(&quote(&date_time.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
            Value::List(values) => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(","))
            }
        }
    }
}
