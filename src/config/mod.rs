//! Application configuration — an opaque key/value store with shallow, later-wins merging.
//!
//! The router never interprets configuration. It merges router-level and route-level
//! [`Config`] values when routes are composed, hands the result to effect builders when an
//! [`App`](crate::App) is compiled, and exposes it verbatim to handlers.
//!
//! [`ConfigSchema`] is an optional startup helper: it applies declared defaults and checks
//! that every declared key is present with the expected JSON kind.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// A JSON object used as application configuration.
///
/// # Examples
///
/// ```
/// use rttp_router::Config;
///
/// let defaults = Config::new().with("logLevel", "info").with("retries", 3);
/// let route = Config::new().with("logLevel", "debug");
///
/// let merged = defaults.merged(&route);
/// assert_eq!(merged.get::<String>("logLevel").unwrap(), "debug");
/// assert_eq!(merged.get::<u32>("retries").unwrap(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    values: Map<String, Value>,
}

impl Config {
    /// Creates an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAnObject`] for any other JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Adds (or replaces) a key, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), ConfigError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Returns a new config with every key of `overrides` replacing the same key here.
    ///
    /// The merge is shallow: nested objects are replaced whole, never combined.
    #[must_use]
    pub fn merged(&self, overrides: &Config) -> Config {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        Config { values }
    }

    /// Returns the raw JSON value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserializes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingKey`] — `key` is absent.
    /// - [`ConfigError::InvalidValue`] — the value does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.get_opt(key)?.ok_or_else(|| ConfigError::MissingKey {
            key: key.to_owned(),
        })
    }

    /// Like [`get`](Self::get), but an absent key (or JSON `null`) yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value does not deserialize into `T`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_owned(),
                    message: e.to_string(),
                }),
        }
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the top-level entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The JSON kind a configuration parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    String,
    Number,
    Integer,
    Bool,
    Array,
    Object,
}

impl ValueKind {
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Any => "any value",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Bool => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A single declared configuration parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigParam {
    pub name: String,
    pub kind: ValueKind,
    pub default: Option<Value>,
}

/// Declared configuration parameters, applied at application startup.
///
/// # Examples
///
/// ```
/// use rttp_router::config::{Config, ConfigSchema, ValueKind};
///
/// let schema = ConfigSchema::new()
///     .param("logLevel", ValueKind::String, Some("info".into()))
///     .param("port", ValueKind::Integer, None);
///
/// let loaded = schema.load(Config::new().with("port", 8080)).unwrap();
/// assert_eq!(loaded.get::<String>("logLevel").unwrap(), "info");
///
/// assert!(schema.load(Config::new()).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    params: Vec<ConfigParam>,
}

impl ConfigSchema {
    /// Creates a schema with no params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter. A `default` of `None` makes it required.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, kind: ValueKind, default: Option<Value>) -> Self {
        self.params.push(ConfigParam {
            name: name.into(),
            kind,
            default,
        });
        self
    }

    /// The declared parameters, in declaration order.
    pub fn params(&self) -> &[ConfigParam] {
        &self.params
    }

    /// Applies defaults underneath `config` and validates the result.
    ///
    /// Every problem is reported, not just the first one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing each missing or mistyped parameter.
    pub fn load(&self, config: Config) -> Result<Config, ConfigError> {
        let mut defaults = Config::new();
        for param in &self.params {
            if let Some(default) = &param.default {
                defaults = defaults.with(param.name.clone(), default.clone());
            }
        }
        let config = defaults.merged(&config);

        let errors: Vec<String> = self
            .params
            .iter()
            .filter_map(|param| match config.value(&param.name) {
                None => Some(format!("'{}' is required", param.name)),
                Some(value) if !param.kind.admits(value) => Some(format!(
                    "'{}' should be {}",
                    param.name,
                    param.kind.describe()
                )),
                Some(_) => None,
            })
            .collect();

        if errors.is_empty() {
            Ok(config)
        } else {
            tracing::error!(errors = ?errors, "config is not valid");
            Err(ConfigError::Invalid { errors })
        }
    }

    /// Reads a JSON object from `path` and [`load`](Self::load)s it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the file cannot be used,
    /// otherwise whatever [`load`](Self::load) returns.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        self.load(Config::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow_and_later_wins() {
        let base = Config::new()
            .with("db", json!({ "host": "a", "port": 1 }))
            .with("name", "base");
        let over = Config::new().with("db", json!({ "host": "b" }));

        let merged = base.merged(&over);
        assert_eq!(merged.value("db"), Some(&json!({ "host": "b" })));
        assert_eq!(merged.get::<String>("name").unwrap(), "base");
        // inputs untouched
        assert_eq!(base.value("db"), Some(&json!({ "host": "a", "port": 1 })));
    }

    #[test]
    fn typed_reads() {
        let config = Config::new().with("port", 8080).with("debug", Value::Null);
        assert_eq!(config.get::<u16>("port").unwrap(), 8080);
        assert_eq!(config.get_opt::<bool>("debug").unwrap(), None);
        assert!(matches!(
            config.get::<String>("missing"),
            Err(ConfigError::MissingKey { .. })
        ));
        assert!(matches!(
            config.get::<String>("port"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn from_value_requires_object() {
        assert!(Config::from_value(json!({ "a": 1 })).is_ok());
        assert!(matches!(
            Config::from_value(json!([1, 2])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn set_serializes() {
        let mut config = Config::new();
        config.set("hosts", &vec!["a", "b"]).unwrap();
        assert_eq!(config.get::<Vec<String>>("hosts").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn schema_collects_every_error() {
        let schema = ConfigSchema::new()
            .param("host", ValueKind::String, None)
            .param("port", ValueKind::Integer, None)
            .param("logLevel", ValueKind::String, Some(json!("info")));

        let err = schema
            .load(Config::new().with("port", "eighty"))
            .unwrap_err();
        match err {
            ConfigError::Invalid { errors } => {
                assert_eq!(
                    errors,
                    vec!["'host' is required", "'port' should be integer"]
                );
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn schema_values_override_defaults() {
        let schema = ConfigSchema::new().param("logLevel", ValueKind::String, Some(json!("info")));
        let loaded = schema
            .load(Config::new().with("logLevel", "trace").with("extra", true))
            .unwrap();
        assert_eq!(loaded.get::<String>("logLevel").unwrap(), "trace");
        assert!(loaded.contains_key("extra"));
    }

    #[test]
    fn load_from_missing_path() {
        let err = ConfigSchema::new()
            .load_from_path("/definitely/not/here.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_from_path_reads_json() {
        let path = std::env::temp_dir().join(format!("rttp-router-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "port": 3000 }"#).unwrap();
        let loaded = ConfigSchema::new()
            .param("port", ValueKind::Integer, None)
            .load_from_path(&path)
            .unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.get::<u16>("port").unwrap(), 3000);
    }
}
