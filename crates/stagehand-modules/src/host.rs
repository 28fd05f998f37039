//! Host application handle passed to every module.

use std::path::{Path, PathBuf};

use crate::module::AsAnyArc;

/// The application that owns the module manager.
///
/// The manager only reads [`root_path`](Self::root_path) to derive the
/// default modules root. Modules get the handle through their context and
/// may downcast it with [`BaseContext::app_as`](crate::BaseContext::app_as).
pub trait HostApp: AsAnyArc {
    /// Application root directory.
    fn root_path(&self) -> &Path;

    /// Human-readable application name.
    fn name(&self) -> &str {
        "stagehand"
    }
}

/// Minimal [`HostApp`] with a fixed root and name.
#[derive(Debug, Clone)]
pub struct BasicHostApp {
    root: PathBuf,
    name: String,
}

impl BasicHostApp {
    /// Create a host rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name: "stagehand".to_owned(),
        }
    }

    /// Set the application name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl HostApp for BasicHostApp {
    fn root_path(&self) -> &Path {
        &self.root
    }

    fn name(&self) -> &str {
        &self.name
    }
}
