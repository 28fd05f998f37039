//! Configuration struct definitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Event name that triggers reverse-order shutdown when nothing else is set.
pub const DEFAULT_QUIT_EVENT: &str = "app:before-quit";

/// Directory under the application root that holds module storage.
pub const DEFAULT_MODULES_DIR: &str = "modules";

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Module manager settings.
    pub modules: ModulesSection,
    /// Logging settings.
    pub logging: LoggingSection,
    /// Free-form per-module settings keyed by module label.
    pub settings: toml::Table,
}

// ---------------------------------------------------------------------------
// ModulesSection
// ---------------------------------------------------------------------------

/// Module manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesSection {
    /// Root directory for per-module storage. Relative paths resolve
    /// against the application root. `None` means `<app_root>/modules`.
    pub root: Option<String>,
    /// Event that drains every loaded module. An empty string disables the
    /// quit listener.
    pub quit_event: String,
}

impl Default for ModulesSection {
    fn default() -> Self {
        Self {
            root: None,
            quit_event: DEFAULT_QUIT_EVENT.to_owned(),
        }
    }
}

impl ModulesSection {
    /// Resolve the modules root against `app_root`.
    #[must_use]
    pub fn resolve_root(&self, app_root: &Path) -> PathBuf {
        match self.root.as_deref() {
            Some(root) if !root.trim().is_empty() => {
                let root = Path::new(root);
                if root.is_absolute() {
                    root.to_path_buf()
                } else {
                    app_root.join(root)
                }
            },
            _ => app_root.join(DEFAULT_MODULES_DIR),
        }
    }

    /// The quit event name, or `None` when the listener is disabled.
    #[must_use]
    pub fn quit_event(&self) -> Option<&str> {
        let name = self.quit_event.trim();
        (!name.is_empty()).then_some(name)
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["stagehand_modules=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
