//! Module lifecycle error types.

use std::path::PathBuf;

use stagehand_config::ConfigError;

use crate::key::ModuleKey;

/// Errors from module lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// A module type was used for a typed lookup but declares no key.
    #[error("module type {type_name} declares no module key")]
    MissingIdentity {
        /// Rust type name of the offending module type.
        type_name: &'static str,
    },

    /// A module with this key is already in the registry.
    #[error("module already registered: {0}")]
    AlreadyRegistered(ModuleKey),

    /// A lifecycle hook reported a failure.
    #[error("{0}")]
    Failed(String),

    /// `destroy` failed. The module has still been removed.
    #[error("destroy failed for module {module}: {source}")]
    DestroyFailed {
        /// The module whose `destroy` hook failed.
        module: ModuleKey,
        /// The hook's error.
        #[source]
        source: Box<ModuleError>,
    },

    /// A storage directory operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reading module configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Any other failure raised by module code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModuleError {
    /// Shorthand for [`ModuleError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for module lifecycle operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors from [`StorageDir`](crate::StorageDir) operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A relative path tried to leave the module's directory.
    #[error("path '{path}' escapes module storage: {reason}")]
    PathEscape {
        /// The rejected relative path.
        path: String,
        /// What made it invalid.
        reason: &'static str,
    },

    /// A filesystem operation failed.
    #[error("storage I/O failed at {}: {source}", path.display())]
    Io {
        /// Absolute path the operation touched.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
