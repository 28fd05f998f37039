//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` into the base tree
//! 2. Merge the host file (`<app_root>/config.toml` or an explicit path)
//! 3. Apply `STAGEHAND_*` env fallbacks for fields no file set
//! 4. Deserialize the merged tree into [`HostConfig`] and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::apply_env_fallbacks;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::reader::ConfigReader;
use crate::types::HostConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// File name of the host config under the application root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration together with where its values came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The typed configuration.
    pub config: HostConfig,
    /// The merged tree the typed configuration was built from.
    pub tree: toml::Value,
    /// Which layer set each leaf field.
    pub field_sources: FieldSources,
    /// Config files that were read, in merge order.
    pub loaded_files: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// A reader over the merged tree, for handing to modules.
    #[must_use]
    pub fn reader(&self) -> ConfigReader {
        ConfigReader::new(self.tree.clone())
    }
}

/// Load the host configuration.
///
/// `explicit_file` must exist when given. Without it, `<app_root>/config.toml`
/// is used if present.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is unreadable, malformed or
/// oversized, or if the merged configuration fails validation.
pub fn load<S: ::std::hash::BuildHasher>(
    app_root: &Path,
    explicit_file: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let host_file = match explicit_file {
        Some(path) => Some((read_value(path)?, path.to_path_buf())),
        None => {
            let path = app_root.join(CONFIG_FILE_NAME);
            try_load_file(&path)?.map(|overlay| (overlay, path))
        },
    };

    if let Some((overlay, path)) = host_file {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::File,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded host config");
        loaded_files.push(path);
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: HostConfig =
        merged
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        tree: merged,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<HostConfig> {
    let value = read_value(path)?;
    let config: HostConfig = value.try_into().map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match read_value(path) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// Read and parse a TOML file, enforcing the size cap.
///
/// Reads once and checks the size afterwards, so there is no window between
/// a stat and the read.
fn read_value(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}
