//! 配置模块，负责加载实体属性定义的JSON配置文件
//!
//! ```json
//! {
//!   "table": "users",
//!   "properties": {
//!     "name": { "type": "text", "sort": { "property": "lower_name", "direction": "ASC", "ignore_case": true } },
//!     "created": { "type": "date_time", "translated_name": "created_at" },
//!     "tags": { "type": "collection<text>" }
//!   }
//! }
//! ```

use crate::ast::{NullHandling, Order};
use crate::registry::{EntityPropertyRegistry, PropertyDescriptor};
use crate::value::{PropertyType, UnknownPropertyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("无法解析JSON配置 {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("属性 {property} 的类型无效: {source}")]
    InvalidType {
        property: String,
        source: UnknownPropertyType,
    },
}

/// 单个属性的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyConfig {
    /// 属性类型，例如 `integer`、`entity<user>`、`collection<text>`
    #[serde(rename = "type")]
    pub property_type: String,
    /// 翻译后的名称（数据库列名），缺省时与属性名相同
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_name: Option<String>,
    /// 按该属性排序时使用的排序模板
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Order>,
}

impl PropertyConfig {
    fn new(property_type: &str) -> Self {
        Self {
            property_type: property_type.to_string(),
            translated_name: None,
            sort: None,
        }
    }

    fn translated(self, translated_name: &str) -> Self {
        Self {
            translated_name: Some(translated_name.to_string()),
            ..self
        }
    }
}

/// 实体的查询配置：表名与属性定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// 实体对应的数据库表名
    pub table: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyConfig>,
}

impl SchemaConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.display().to_string()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;

        let config = Self::parse(&content, &path_ref.display().to_string())?;
        debug!(
            path = %path_ref.display(),
            table = %config.table,
            properties = config.properties.len(),
            "loaded schema configuration"
        );
        Ok(config)
    }

    /// 从JSON字符串加载配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// 构建属性注册表，类型无法识别时返回错误
    pub fn registry(&self) -> Result<EntityPropertyRegistry, ConfigError> {
        let mut registry = EntityPropertyRegistry::new();
        for (name, property) in &self.properties {
            let property_type: PropertyType =
                property
                    .property_type
                    .parse()
                    .map_err(|source| ConfigError::InvalidType {
                        property: name.clone(),
                        source,
                    })?;

            let mut descriptor = PropertyDescriptor::new(name.clone(), property_type);
            if let Some(translated_name) = &property.translated_name {
                descriptor = descriptor.with_translated_name(translated_name.clone());
            }
            if let Some(sort) = &property.sort {
                descriptor = descriptor.with_sort_order(sort.clone());
            }
            registry.register(descriptor);
        }
        Ok(registry)
    }
}

/// 演示用的用户实体配置（用于测试或fallback）
impl Default for SchemaConfig {
    fn default() -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), PropertyConfig::new("integer"));
        properties.insert(
            "name".to_string(),
            PropertyConfig {
                sort: Some(
                    Order::asc("name")
                        .ignoring_case()
                        .with_null_handling(NullHandling::NullsLast),
                ),
                ..PropertyConfig::new("text")
            },
        );
        properties.insert("email".to_string(), PropertyConfig::new("text"));
        properties.insert("city".to_string(), PropertyConfig::new("text"));
        properties.insert("age".to_string(), PropertyConfig::new("integer"));
        properties.insert("score".to_string(), PropertyConfig::new("decimal"));
        properties.insert("active".to_string(), PropertyConfig::new("boolean"));
        properties.insert("birthday".to_string(), PropertyConfig::new("date"));
        properties.insert(
            "created".to_string(),
            PropertyConfig::new("date_time").translated("created_at"),
        );
        properties.insert(
            "manager".to_string(),
            PropertyConfig::new("entity<user>").translated("manager_id"),
        );
        properties.insert("tags".to_string(), PropertyConfig::new("collection<text>"));

        Self {
            table: "users".to_string(),
            properties,
        }
    }
}
