#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Reference Stagehand host.
//!
//! Wires configuration, the event bus and a [`ModuleManager`] together and
//! ships two stock modules: [`Journal`] and [`Heartbeat`].

pub mod heartbeat;
pub mod journal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stagehand_config::ResolvedConfig;
use stagehand_events::EventBus;
use stagehand_modules::{
    BasicHostApp, ManagerConfig, ModuleDefinition, ModuleKey, ModuleManager, ModuleResult,
};
use tracing::{info, warn};

pub use heartbeat::Heartbeat;
pub use journal::Journal;

/// Application name reported to modules.
pub const APP_NAME: &str = "stagehand";

/// Per-user data directory used when no root is given.
#[must_use]
pub fn default_app_root() -> Option<PathBuf> {
    directories::ProjectDirs::from("rs", "stagehand", APP_NAME).map(|d| d.data_dir().to_path_buf())
}

/// Definitions of the stock modules, in load order.
///
/// # Errors
///
/// Returns an error if a stock module declares no key.
pub fn builtin_modules() -> ModuleResult<Vec<ModuleDefinition>> {
    Ok(vec![
        ModuleDefinition::of::<Journal>()?,
        ModuleDefinition::of::<Heartbeat>()?,
    ])
}

/// A running host.
#[derive(Debug)]
pub struct Host {
    root: PathBuf,
    events: EventBus,
    manager: Arc<ModuleManager>,
    quit_event: Option<String>,
}

impl Host {
    /// Build a host rooted at `root`.
    ///
    /// Call from inside a Tokio runtime so the quit listener attaches.
    #[must_use]
    pub fn new(root: &Path, resolved: &ResolvedConfig) -> Self {
        let events = EventBus::new();
        let app = Arc::new(BasicHostApp::new(root).with_name(APP_NAME));
        let manager = ModuleManager::new(
            app,
            ManagerConfig::from_host_config(&resolved.config, root, resolved.reader())
                .with_event_bus(events.clone()),
        );

        Self {
            root: root.to_path_buf(),
            events,
            manager,
            quit_event: resolved.config.modules.quit_event().map(str::to_owned),
        }
    }

    /// The application root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The host event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The module manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    /// Load `definitions` in order, returning the keys that loaded.
    ///
    /// A module that fails its hooks is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error the manager reports.
    pub async fn load_all(
        &self,
        definitions: Vec<ModuleDefinition>,
    ) -> ModuleResult<Vec<ModuleKey>> {
        let mut loaded = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let key = definition.key().clone();
            if self.manager.load_module(definition).await? {
                loaded.push(key);
            } else {
                warn!(module = %key, "module did not load");
            }
        }
        info!(count = loaded.len(), "modules loaded");
        Ok(loaded)
    }

    /// Announce the quit and wait for every module to unload.
    ///
    /// Without a quit event, or once the manager's listener is detached, the
    /// manager is drained directly. Returns the number of modules unloaded.
    pub async fn quit(&self) -> usize {
        let loaded = self.manager.len();
        match &self.quit_event {
            Some(event) if self.manager.has_quit_listener() => {
                self.events.emit(event.as_str(), serde_json::Value::Null);
                self.manager.wait_for_shutdown().await;
                loaded.saturating_sub(self.manager.len())
            },
            _ => self.manager.shutdown().await,
        }
    }
}
