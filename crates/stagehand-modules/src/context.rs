//! Lifecycle context types.
//!
//! Every hook receives a phase context: the shared [`BaseContext`] plus the
//! fields specific to that phase. Phase contexts deref to the base, so
//! `ctx.storage` and `ctx.manager` work on any of them.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stagehand_config::ConfigReader;
use stagehand_events::EventBus;

use crate::error::ModuleResult;
use crate::host::HostApp;
use crate::key::ModuleKey;
use crate::manager::ModuleManager;
use crate::module::{AsAnyArc, ModuleType};
use crate::storage::{ResolvedFileConfig, StorageDir};

/// Why a module is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Explicit unload.
    Normal,
    /// Rollback after `start` failed.
    Error,
    /// The host is quitting.
    AppQuit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::AppQuit => "app-quit",
        })
    }
}

/// Fields every phase context carries.
#[derive(Clone)]
pub struct BaseContext {
    /// The host application.
    pub app: Arc<dyn HostApp>,
    /// The manager, for sibling lookups.
    ///
    /// Do not keep this beyond the hook call: a module that stores it keeps
    /// the manager alive.
    pub manager: Arc<ModuleManager>,
    /// The module's own key.
    pub key: ModuleKey,
    /// Read access to the host configuration.
    pub config: ConfigReader,
    /// The host event bus, when there is one.
    pub events: Option<EventBus>,
    /// Opaque inter-module channel, passed through untouched.
    pub channel: Option<Arc<dyn Any + Send + Sync>>,
    /// The module's storage directory, when it declared one.
    pub storage: Option<StorageDir>,
}

impl BaseContext {
    /// Downcast the host application handle.
    #[must_use]
    pub fn app_as<T: HostApp>(&self) -> Option<Arc<T>> {
        AsAnyArc::into_any_arc(Arc::clone(&self.app))
            .downcast::<T>()
            .ok()
    }

    /// Downcast the communication channel.
    #[must_use]
    pub fn channel_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.channel
            .as_ref()
            .and_then(|channel| Arc::clone(channel).downcast::<T>().ok())
    }

    /// This module's `[settings.<name>]` table.
    #[must_use]
    pub fn module_settings(&self) -> ConfigReader {
        self.config.entry("settings", &self.key.name())
    }

    /// Look up a loaded sibling by type.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` declares no key.
    pub fn sibling<T: ModuleType>(&self) -> ModuleResult<Option<Arc<T>>> {
        self.manager.get::<T>()
    }
}

impl fmt::Debug for BaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseContext")
            .field("app_root", &self.app.root_path())
            .field("key", &self.key)
            .field("has_events", &self.events.is_some())
            .field("has_channel", &self.channel.is_some())
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

macro_rules! phase_context {
    ($(#[$doc:meta])* $name:ident { $($(#[$fdoc:meta])* $field:ident: $ty:ty),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            /// Shared fields.
            pub base: BaseContext,
            $($(#[$fdoc])* pub $field: $ty,)*
        }

        impl Deref for $name {
            type Target = BaseContext;

            fn deref(&self) -> &BaseContext {
                &self.base
            }
        }
    };
}

phase_context! {
    /// Context for `created` and for module constructors.
    CreateContext {
        /// Resolved storage declaration.
        file: ResolvedFileConfig,
        /// Resolved entry path.
        entry_path: Option<PathBuf>,
        /// Whether this load replaces a previous instance.
        hot_reload: bool,
    }
}

phase_context! {
    /// Context for `init`.
    InitContext {
        /// Whether the host considers this module's dependencies loaded.
        dependencies_ready: bool,
    }
}

phase_context! {
    /// Context for `start`.
    StartContext {
        /// Free-form start arguments.
        args: serde_json::Value,
    }
}

phase_context! {
    /// Context for `stop`.
    StopContext {
        /// Why the module is stopping.
        reason: StopReason,
    }
}

phase_context! {
    /// Context for `destroy`.
    DestroyContext {
        /// Whether the host is quitting.
        app_closing: bool,
    }
}

/// Builds phase contexts from one [`BaseContext`].
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    base: BaseContext,
}

impl ContextBuilder {
    /// Start from `base`.
    #[must_use]
    pub fn new(base: BaseContext) -> Self {
        Self { base }
    }

    /// The shared fields.
    #[must_use]
    pub fn base(&self) -> &BaseContext {
        &self.base
    }

    /// Entry path: the module's override, else `<dir>/index` when a
    /// directory is provisioned, else none.
    #[must_use]
    pub fn resolve_entry_path(
        explicit: Option<PathBuf>,
        file: &ResolvedFileConfig,
    ) -> Option<PathBuf> {
        explicit.or_else(|| file.dir_path().map(|dir| dir.join("index")))
    }

    /// Context for `created`.
    #[must_use]
    pub fn create(
        &self,
        file: ResolvedFileConfig,
        entry_path: Option<PathBuf>,
        hot_reload: bool,
    ) -> CreateContext {
        CreateContext {
            base: self.base.clone(),
            file,
            entry_path,
            hot_reload,
        }
    }

    /// Context for `init`.
    #[must_use]
    pub fn init(&self, dependencies_ready: bool) -> InitContext {
        InitContext {
            base: self.base.clone(),
            dependencies_ready,
        }
    }

    /// Context for `start`.
    #[must_use]
    pub fn start(&self, args: serde_json::Value) -> StartContext {
        StartContext {
            base: self.base.clone(),
            args,
        }
    }

    /// Context for `stop`.
    #[must_use]
    pub fn stop(&self, reason: StopReason) -> StopContext {
        StopContext {
            base: self.base.clone(),
            reason,
        }
    }

    /// Context for `destroy`.
    #[must_use]
    pub fn destroy(&self, app_closing: bool) -> DestroyContext {
        DestroyContext {
            base: self.base.clone(),
            app_closing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BasicHostApp;
    use crate::manager::ManagerConfig;
    use std::path::Path;

    fn builder(storage: Option<StorageDir>) -> ContextBuilder {
        let app: Arc<dyn HostApp> = Arc::new(BasicHostApp::new("/app"));
        let config = ConfigReader::new(
            toml::from_str("[settings.search]\nlimit = 7\n").unwrap(),
        );
        let manager = ModuleManager::new(
            Arc::clone(&app),
            ManagerConfig::default().with_config(config.clone()),
        );
        ContextBuilder::new(BaseContext {
            app,
            manager,
            key: ModuleKey::new("search"),
            config,
            events: None,
            channel: Some(Arc::new(String::from("bridge"))),
            storage,
        })
    }

    #[test]
    fn test_entry_path_resolution() {
        let enabled = ResolvedFileConfig::Enabled {
            dir_name: "search".to_owned(),
            dir_path: PathBuf::from("/app/modules/search"),
        };

        assert_eq!(
            ContextBuilder::resolve_entry_path(None, &enabled),
            Some(PathBuf::from("/app/modules/search/index"))
        );
        assert_eq!(
            ContextBuilder::resolve_entry_path(Some(PathBuf::from("/opt/search.js")), &enabled),
            Some(PathBuf::from("/opt/search.js"))
        );
        assert_eq!(
            ContextBuilder::resolve_entry_path(None, &ResolvedFileConfig::Disabled),
            None
        );
    }

    #[test]
    fn test_phase_contexts_share_base() {
        let builder = builder(Some(StorageDir::new("/app/modules/search")));

        let stop = builder.stop(StopReason::AppQuit);
        assert_eq!(stop.reason, StopReason::AppQuit);
        assert_eq!(stop.key.label(), Some("search"));
        assert_eq!(
            stop.storage.as_ref().map(StorageDir::path),
            Some(Path::new("/app/modules/search"))
        );

        let destroy = builder.destroy(true);
        assert!(destroy.app_closing);
        assert_eq!(destroy.key, stop.key);

        let start = builder.start(serde_json::json!({ "warm": true }));
        assert_eq!(start.args["warm"], true);
        assert!(builder.init(false).storage.is_some());
    }

    #[test]
    fn test_channel_and_app_downcast() {
        let builder = builder(None);
        let ctx = builder.init(true);

        assert_eq!(ctx.channel_as::<String>().as_deref().map(String::as_str), Some("bridge"));
        assert!(ctx.channel_as::<u32>().is_none());
        assert_eq!(
            ctx.app_as::<BasicHostApp>().map(|app| app.root_path().to_path_buf()),
            Some(PathBuf::from("/app"))
        );
    }

    #[test]
    fn test_module_settings_scoped_by_name() {
        let builder = builder(None);
        let settings = builder.init(true).module_settings();
        assert_eq!(settings.get_as::<i64>("limit").unwrap(), Some(7));
    }

    #[test]
    fn test_module_settings_with_dotted_name() {
        let mut base = builder(None).base().clone();
        base.key = ModuleKey::new("search.v2");
        base.config = ConfigReader::new(
            toml::from_str("[settings.\"search.v2\"]\nlimit = 3\n[settings.search.v2]\nlimit = 8\n")
                .unwrap(),
        );

        let settings = ContextBuilder::new(base).init(true).module_settings();
        assert_eq!(settings.get_as::<i64>("limit").unwrap(), Some(3));
    }

    #[test]
    fn test_stop_reason_display_and_serde() {
        assert_eq!(StopReason::AppQuit.to_string(), "app-quit");
        assert_eq!(
            serde_json::to_string(&StopReason::AppQuit).unwrap(),
            "\"app-quit\""
        );
    }
}
