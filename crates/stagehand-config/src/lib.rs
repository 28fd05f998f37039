#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the Stagehand host.
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Host file** (`<app_root>/config.toml`, or an explicit path)
//! 2. **Environment variables** (`STAGEHAND_*`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! Modules read their own settings from `[settings.<label>]` through a
//! [`ConfigReader`].
//!
//! ```rust,no_run
//! use stagehand_config::HostConfig;
//!
//! let resolved = HostConfig::load(std::path::Path::new("."), None).unwrap();
//! println!("quit event: {}", resolved.config.modules.quit_event);
//! ```

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Read access to the merged tree.
pub mod reader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::{ConfigLayer, FieldSources};
pub use reader::ConfigReader;
pub use types::*;

impl HostConfig {
    /// Load configuration for an application rooted at `app_root`, using the
    /// process environment for fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if loading or validation fails.
    pub fn load(
        app_root: &std::path::Path,
        explicit_file: Option<&std::path::Path>,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(app_root, explicit_file, &env::collect_env_vars())
    }
}
