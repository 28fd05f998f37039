//! Environment variable fallbacks.
//!
//! A `STAGEHAND_*` variable only fills a field that no config file set.
//! Values are passed in as a map so callers (and tests) never touch the
//! process environment directly.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Maps an environment variable onto a dotted config path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "STAGEHAND_MODULES_ROOT",
        field_path: "modules.root",
    },
    EnvMapping {
        var_name: "STAGEHAND_QUIT_EVENT",
        field_path: "modules.quit_event",
    },
    EnvMapping {
        var_name: "STAGEHAND_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "STAGEHAND_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Apply environment fallbacks to fields still at their default.
///
/// Returns the number of fields that were filled from the environment.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if matches!(sources.get(mapping.field_path), Some(layer) if *layer != ConfigLayer::Defaults)
        {
            continue;
        }

        let Some(val) = env_vars.get(mapping.var_name) else {
            continue;
        };
        if val.trim().is_empty() {
            continue;
        }

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field_from_string(merged, mapping.field_path, val);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

/// Set a dotted-path field to a string value, creating intermediate tables.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for seg in segments {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(seg.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let toml::Value::Table(table) = current {
        table.insert(leaf.to_owned(), toml::Value::String(val.to_owned()));
    }
}

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::record_leaves;

    fn defaults() -> (toml::Value, FieldSources) {
        let val: toml::Value =
            toml::from_str("[modules]\nquit_event = \"app:before-quit\"\n[logging]\nlevel = \"info\"\n")
                .unwrap();
        let mut sources = FieldSources::new();
        record_leaves(&val, "", &ConfigLayer::Defaults, &mut sources);
        (val, sources)
    }

    #[test]
    fn test_env_overrides_defaults() {
        let (mut val, mut sources) = defaults();
        let env = HashMap::from([("STAGEHAND_LOG_LEVEL".to_owned(), "trace".to_owned())]);

        assert_eq!(apply_env_fallbacks(&mut val, &mut sources, &env), 1);
        assert_eq!(val["logging"]["level"].as_str(), Some("trace"));
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_env_does_not_override_file_values() {
        let (mut val, mut sources) = defaults();
        sources.insert("logging.level".to_owned(), ConfigLayer::File);
        let env = HashMap::from([("STAGEHAND_LOG_LEVEL".to_owned(), "trace".to_owned())]);

        assert_eq!(apply_env_fallbacks(&mut val, &mut sources, &env), 0);
        assert_eq!(val["logging"]["level"].as_str(), Some("info"));
    }

    #[test]
    fn test_env_creates_missing_fields() {
        let (mut val, mut sources) = defaults();
        let env = HashMap::from([("STAGEHAND_MODULES_ROOT".to_owned(), "/srv/mods".to_owned())]);

        apply_env_fallbacks(&mut val, &mut sources, &env);
        assert_eq!(val["modules"]["root"].as_str(), Some("/srv/mods"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let (mut val, mut sources) = defaults();
        let env = HashMap::from([("STAGEHAND_QUIT_EVENT".to_owned(), "  ".to_owned())]);

        assert_eq!(apply_env_fallbacks(&mut val, &mut sources, &env), 0);
        assert_eq!(val["modules"]["quit_event"].as_str(), Some("app:before-quit"));
    }
}
