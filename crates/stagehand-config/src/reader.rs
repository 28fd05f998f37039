//! Read-only access to the merged configuration tree.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, ConfigResult};
use crate::types::HostConfig;

/// Cheap-to-clone handle onto the merged configuration.
///
/// Paths are dotted (`"settings.search.limit"`). An empty path addresses the
/// root of the tree.
#[derive(Debug, Clone)]
pub struct ConfigReader {
    root: Arc<toml::Value>,
}

impl ConfigReader {
    /// Wrap an already merged tree.
    #[must_use]
    pub fn new(root: toml::Value) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// A reader over an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(toml::Value::Table(toml::Table::new()))
    }

    /// Build a reader from a typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be represented as TOML.
    pub fn from_config(config: &HostConfig) -> ConfigResult<Self> {
        let root = toml::Value::try_from(config).map_err(|e| ConfigError::ValidationError {
            field: "<config>".to_owned(),
            message: e.to_string(),
        })?;
        Ok(Self::new(root))
    }

    /// The whole tree.
    #[must_use]
    pub fn root(&self) -> &toml::Value {
        &self.root
    }

    /// Look up a value by dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        path.split('.')
            .filter(|seg| !seg.is_empty())
            .try_fold(self.root.as_ref(), |node, seg| node.as_table()?.get(seg))
    }

    /// Whether a value exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Look up a string value.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(toml::Value::as_str)
    }

    /// Look up and deserialize a value.
    ///
    /// Returns `Ok(None)` when nothing is set at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TypeMismatch`] if the value exists but does not
    /// deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        let Some(value) = self.get(path) else {
            return Ok(None);
        };
        value
            .clone()
            .try_into()
            .map(Some)
            .map_err(|source| ConfigError::TypeMismatch {
                field: path.to_owned(),
                source,
            })
    }

    /// A reader rooted at the table entry `key` under `path`.
    ///
    /// `key` is taken literally, so it may contain dots. Missing entries
    /// yield an empty reader.
    #[must_use]
    pub fn entry(&self, path: &str, key: &str) -> Self {
        match self.get(path).and_then(toml::Value::as_table).and_then(|t| t.get(key)) {
            Some(value) => Self::new(value.clone()),
            None => Self::empty(),
        }
    }

    /// A reader rooted at `path`. Missing paths yield an empty reader.
    #[must_use]
    pub fn scoped(&self, path: &str) -> Self {
        match self.get(path) {
            Some(value) => Self::new(value.clone()),
            None => Self::empty(),
        }
    }
}

impl Default for ConfigReader {
    fn default() -> Self {
        Self::empty()
    }
}
