//! Configuration snapshot
//!
//! The platform binds one [`ConfigData`] at the root injector. Components
//! read it like any other dependency and pick values by dotted path.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::debug;

/// File read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tarpit.json";

/// Errors raised while loading or reading configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Can't read config file \"{path}\": {reason}")]
    Io { path: String, reason: String },

    #[error("Config file \"{path}\" is not valid JSON: {reason}")]
    Parse { path: String, reason: String },

    #[error("Config file \"{path}\" must contain a JSON object")]
    NotObject { path: String },

    #[error("Config value at \"{path}\" has the wrong shape: {reason}")]
    Shape { path: String, reason: String },
}

/// Immutable JSON configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigData {
    data: Value,
}

impl ConfigData {
    /// Wrap a document.
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Read a JSON object from `path`, or from `tarpit.json`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: shown.clone(),
            reason: err.to_string(),
        })?;
        let config = Self::from_json(&text).map_err(|err| match err {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: shown.clone(),
                reason,
            },
            ConfigError::NotObject { .. } => ConfigError::NotObject {
                path: shown.clone(),
            },
            other => other,
        })?;

        #[cfg(feature = "logging")]
        debug!(target: "tarpit", path = %shown, "Loaded configuration");

        Ok(config)
    }

    /// Parse a JSON object from text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let data: Value = serde_json::from_str(text).map_err(|err| ConfigError::Parse {
            path: String::new(),
            reason: err.to_string(),
        })?;
        if !data.is_object() {
            return Err(ConfigError::NotObject { path: String::new() });
        }
        Ok(Self { data })
    }

    /// Value at dotted `path`; `""` is the whole document.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.data);
        }
        path.split('.').try_fold(&self.data, |node, key| match node {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Value at dotted `path`, deserialized. `Ok(None)` when absent.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ConfigError> {
        self.get(path)
            .map(|value| {
                T::deserialize(value).map_err(|err| ConfigError::Shape {
                    path: path.to_string(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    /// The whole document.
    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> ConfigData {
        ConfigData::new(json!({
            "http": { "port": 3000, "hosts": ["a", "b"] },
            "name": "demo"
        }))
    }

    #[test]
    fn test_dotted_paths() {
        let config = sample();
        assert_eq!(config.get("http.port"), Some(&json!(3000)));
        assert_eq!(config.get("http.hosts.1"), Some(&json!("b")));
        assert_eq!(config.get("http.missing"), None);
        assert_eq!(config.get("name.deeper"), None);
        assert_eq!(config.get(""), Some(config.data()));
    }

    #[test]
    fn test_get_as() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Http {
            port: u16,
        }

        let config = sample();
        assert_eq!(config.get_as::<Http>("http").unwrap(), Some(Http { port: 3000 }));
        assert_eq!(config.get_as::<u16>("nope").unwrap(), None);
        assert!(matches!(config.get_as::<u16>("name"), Err(ConfigError::Shape { .. })));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(matches!(ConfigData::from_json("[1]"), Err(ConfigError::NotObject { .. })));
        assert!(matches!(ConfigData::from_json("{"), Err(ConfigError::Parse { .. })));
        assert!(ConfigData::from_json("{}").is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let missing = "/definitely/not/here.json";
        let err = ConfigData::load(Some(Path::new(missing))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path == missing));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tarpit-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"answer": 42}"#).unwrap();
        let config = ConfigData::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.get_as::<u32>("answer").unwrap(), Some(42));
    }
}
