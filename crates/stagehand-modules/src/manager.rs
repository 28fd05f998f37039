//! Module lifecycle manager.
//!
//! Loads modules through `created → init → start`, rolls back whatever a
//! failing module already ran, and unloads through `stop → destroy`. When
//! wired to an event bus it drains every module in reverse load order on
//! the host's quit event.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use stagehand_config::{ConfigReader, DEFAULT_MODULES_DIR, HostConfig};
use stagehand_events::{EventBus, SubscriberId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::context::{BaseContext, ContextBuilder, StopReason};
use crate::error::{ModuleError, ModuleResult};
use crate::host::HostApp;
use crate::key::ModuleKey;
use crate::module::{AsAnyArc, LifecyclePhase, LoadOptions, Module, ModuleDefinition, ModuleType};
use crate::registry::ModuleRegistry;
use crate::storage::{ModuleFileConfig, ResolvedFileConfig, StorageDir};

/// Optional manager settings.
#[derive(Clone, Default)]
pub struct ManagerConfig {
    /// Event bus forwarded to modules and used for the quit listener.
    pub events: Option<EventBus>,
    /// Event that drains every module. Needs `events` to take effect.
    pub quit_event: Option<String>,
    /// Override for `<app_root>/modules`.
    pub modules_root: Option<PathBuf>,
    /// Configuration handed to modules.
    pub config: ConfigReader,
    /// Opaque inter-module channel.
    pub channel: Option<Arc<dyn Any + Send + Sync>>,
}

impl ManagerConfig {
    /// Settings derived from the host configuration.
    ///
    /// `reader` should be the reader over the same merged tree.
    #[must_use]
    pub fn from_host_config(config: &HostConfig, app_root: &Path, reader: ConfigReader) -> Self {
        Self {
            quit_event: config.modules.quit_event().map(str::to_owned),
            modules_root: Some(config.modules.resolve_root(app_root)),
            config: reader,
            ..Self::default()
        }
    }

    /// Set the event bus.
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the quit event name.
    #[must_use]
    pub fn with_quit_event(mut self, event: impl Into<String>) -> Self {
        self.quit_event = Some(event.into());
        self
    }

    /// Override the modules root.
    #[must_use]
    pub fn with_modules_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.modules_root = Some(root.into());
        self
    }

    /// Set the configuration reader.
    #[must_use]
    pub fn with_config(mut self, config: ConfigReader) -> Self {
        self.config = config;
        self
    }

    /// Set the communication channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn Any + Send + Sync>) -> Self {
        self.channel = Some(channel);
        self
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("has_events", &self.events.is_some())
            .field("quit_event", &self.quit_event)
            .field("modules_root", &self.modules_root)
            .field("has_channel", &self.channel.is_some())
            .finish_non_exhaustive()
    }
}

struct QuitListener {
    event: String,
    subscriber: SubscriberId,
}

/// Counts quit events received and drains finished.
struct DrainProgress {
    requested: AtomicUsize,
    completed: watch::Sender<usize>,
    /// Parked until a Tokio runtime is available to run the drain task.
    parked: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

/// Owns the module registry and drives every lifecycle transition.
///
/// Created behind an `Arc` because contexts hand the manager to modules.
pub struct ModuleManager {
    app: Arc<dyn HostApp>,
    registry: RwLock<ModuleRegistry>,
    modules_root: PathBuf,
    config: ConfigReader,
    events: Option<EventBus>,
    channel: Option<Arc<dyn Any + Send + Sync>>,
    quit: Mutex<Option<QuitListener>>,
    drain: DrainProgress,
}

impl ModuleManager {
    /// Create a manager.
    ///
    /// With both an event bus and a quit event configured, subscribes to the
    /// quit event. The drain runs on a task spawned on the Tokio runtime
    /// current at construction, or failing that on the one current when the
    /// first quit event is emitted.
    #[must_use]
    pub fn new(app: Arc<dyn HostApp>, config: ManagerConfig) -> Arc<Self> {
        let modules_root = config
            .modules_root
            .unwrap_or_else(|| app.root_path().join(DEFAULT_MODULES_DIR));
        let (completed, _) = watch::channel(0);

        let manager = Arc::new(Self {
            app,
            registry: RwLock::new(ModuleRegistry::new()),
            modules_root,
            config: config.config,
            events: config.events,
            channel: config.channel,
            quit: Mutex::new(None),
            drain: DrainProgress {
                requested: AtomicUsize::new(0),
                completed,
                parked: Mutex::new(None),
            },
        });

        if let Some(event) = config.quit_event {
            manager.attach_quit_listener(event);
        }

        manager
    }

    fn attach_quit_listener(self: &Arc<Self>, event: String) {
        let Some(bus) = &self.events else {
            debug!(event = %event, "no event bus, quit listener not attached");
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel::<()>();
        *self
            .drain
            .parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(rx);
        if !self.spawn_drain_task() {
            debug!(event = %event, "no Tokio runtime yet, drain task deferred");
        }

        let weak = Arc::downgrade(self);
        let subscriber = bus.on(event.clone(), move |_| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            if !manager.spawn_drain_task() {
                error!("quit event emitted outside a Tokio runtime, modules will not be drained");
                return;
            }
            manager.drain.requested.fetch_add(1, Ordering::SeqCst);
            if tx.send(()).is_err() {
                error!("quit listener task is gone, modules will not be drained");
            }
        });

        debug!(event = %event, "quit listener attached");
        *self.quit.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(QuitListener { event, subscriber });
    }

    /// Start the drain task if it is not running yet.
    ///
    /// Returns `false` when the task is still parked because no Tokio runtime
    /// is current.
    fn spawn_drain_task(self: &Arc<Self>) -> bool {
        let mut parked = self
            .drain
            .parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if parked.is_none() {
            return true;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let Some(mut rx) = parked.take() else {
            return true;
        };

        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            while rx.recv().await.is_some() {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.shutdown().await;
                manager
                    .drain
                    .completed
                    .send_modify(|done| *done = done.saturating_add(1));
            }
        });
        true
    }

    /// Whether a quit listener is subscribed.
    #[must_use]
    pub fn has_quit_listener(&self) -> bool {
        self.quit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Unsubscribe from the quit event.
    ///
    /// Returns `true` if a listener was attached.
    pub fn detach_quit_listener(&self) -> bool {
        let listener = self
            .quit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match (listener, &self.events) {
            (Some(listener), Some(bus)) => {
                debug!(event = %listener.event, "quit listener detached");
                bus.off(listener.subscriber)
            },
            _ => false,
        }
    }

    /// Wait until every quit event received so far has been drained.
    ///
    /// Returns immediately when none was received.
    pub async fn wait_for_shutdown(&self) {
        let requested = self.drain.requested.load(Ordering::SeqCst);
        let mut completed = self.drain.completed.subscribe();
        // The sender lives in `self`, so this cannot report a closed channel.
        let _ = completed.wait_for(|done| *done >= requested).await;
    }

    /// Load a module with default [`LoadOptions`].
    ///
    /// # Errors
    ///
    /// See [`load_module_with`](Self::load_module_with).
    pub async fn load_module(self: &Arc<Self>, definition: ModuleDefinition) -> ModuleResult<bool> {
        self.load_module_with(definition, LoadOptions::default())
            .await
    }

    /// Load a module.
    ///
    /// Returns `Ok(true)` once the module is registered. Returns `Ok(false)`
    /// if it was already loaded (no hook runs), or if a hook failed and the
    /// module was rolled back. A failed `created` or `init` is followed by
    /// `destroy`; a failed `start` by `stop` and `destroy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created (before
    /// any hook runs) or if `destroy` fails during rollback.
    pub async fn load_module_with(
        self: &Arc<Self>,
        definition: ModuleDefinition,
        options: LoadOptions,
    ) -> ModuleResult<bool> {
        let module = match definition {
            ModuleDefinition::Instance(module) => module,
            ModuleDefinition::Constructor { key, construct } => {
                let ctx = ContextBuilder::new(self.base_context(key.clone(), None)).create(
                    ResolvedFileConfig::Disabled,
                    None,
                    options.hot_reload,
                );
                match construct(&ctx) {
                    Ok(module) => module,
                    Err(e) => {
                        warn!(module = %key, error = %e, "module constructor failed");
                        return Ok(false);
                    },
                }
            },
        };

        let key = module.key().clone();
        if self.has_module(&key) {
            debug!(module = %key, "module already loaded, skipping");
            return Ok(false);
        }

        let file = ModuleFileConfig::resolve(module.file_config().as_ref(), &key, &self.modules_root);
        let storage = file.storage();
        if let Some(dir) = &storage {
            dir.ensure().await?;
        }

        let entry_path = ContextBuilder::resolve_entry_path(module.entry_path(), &file);
        let builder = ContextBuilder::new(self.base_context(key.clone(), storage));
        let hooks = module.hooks();

        if let Some(hooks) = hooks {
            debug!(module = %key, phase = %LifecyclePhase::Created, "dispatching hook");
            let ctx = builder.create(file, entry_path, options.hot_reload);
            if let Err(e) = hooks.created(&ctx).await {
                self.rollback(&module, &builder, LifecyclePhase::Created, &e)
                    .await?;
                return Ok(false);
            }
        }

        debug!(module = %key, phase = %LifecyclePhase::Init, "dispatching hook");
        if let Err(e) = module.init(&builder.init(options.dependencies_ready)).await {
            self.rollback(&module, &builder, LifecyclePhase::Init, &e)
                .await?;
            return Ok(false);
        }

        if let Some(hooks) = hooks {
            debug!(module = %key, phase = %LifecyclePhase::Start, "dispatching hook");
            if let Err(e) = hooks.start(&builder.start(options.start_args)).await {
                self.rollback(&module, &builder, LifecyclePhase::Start, &e)
                    .await?;
                return Ok(false);
            }
        }

        let registered = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(Arc::clone(&module));
        if let Err(e) = registered {
            // Lost a race with a concurrent load of the same key.
            self.rollback(&module, &builder, LifecyclePhase::Start, &e)
                .await?;
            return Err(e);
        }

        info!(module = %key, "module loaded");
        Ok(true)
    }

    /// Undo a partial load. `stop` only runs when `start` was reached.
    async fn rollback(
        &self,
        module: &Arc<dyn Module>,
        builder: &ContextBuilder,
        failed: LifecyclePhase,
        cause: &ModuleError,
    ) -> ModuleResult<()> {
        let key = module.key();
        warn!(module = %key, phase = %failed, error = %cause, "lifecycle hook failed, rolling back");

        if failed == LifecyclePhase::Start
            && let Some(hooks) = module.hooks()
            && let Err(e) = hooks.stop(&builder.stop(StopReason::Error)).await
        {
            warn!(module = %key, error = %e, "stop failed during rollback");
        }

        module
            .destroy(&builder.destroy(false))
            .await
            .map_err(|source| ModuleError::DestroyFailed {
                module: key.clone(),
                source: Box::new(source),
            })
    }

    /// Unload a module with [`StopReason::Normal`].
    ///
    /// # Errors
    ///
    /// See [`unload_module`](Self::unload_module).
    pub async fn unload(self: &Arc<Self>, key: &ModuleKey) -> ModuleResult<bool> {
        self.unload_module(key, StopReason::Normal).await
    }

    /// Unload a module.
    ///
    /// Runs `stop` (errors are logged), then `destroy`, then removes the
    /// module from the registry no matter what. Returns `Ok(false)` for an
    /// unknown key or when `stop` failed, `Ok(true)` otherwise. Use
    /// [`has_module`](Self::has_module) to ask whether a module is gone.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::DestroyFailed`] if `destroy` failed. The module
    /// has been removed by then.
    pub async fn unload_module(
        self: &Arc<Self>,
        key: &ModuleKey,
        reason: StopReason,
    ) -> ModuleResult<bool> {
        let Some(module) = self.get_module(key) else {
            debug!(module = %key, "module not loaded, nothing to unload");
            return Ok(false);
        };

        let file = ModuleFileConfig::resolve(module.file_config().as_ref(), key, &self.modules_root);
        let builder = ContextBuilder::new(self.base_context(key.clone(), file.storage()));

        let stopped = match module.hooks() {
            Some(hooks) => {
                debug!(module = %key, phase = %LifecyclePhase::Stop, reason = %reason, "dispatching hook");
                match hooks.stop(&builder.stop(reason)).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(module = %key, error = %e, "stop failed, continuing unload");
                        false
                    },
                }
            },
            None => true,
        };

        debug!(module = %key, phase = %LifecyclePhase::Destroy, "dispatching hook");
        let destroyed = module
            .destroy(&builder.destroy(reason == StopReason::AppQuit))
            .await;

        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister(key);
        drop(module);

        if let Err(source) = destroyed {
            warn!(module = %key, error = %source, "destroy failed, module removed anyway");
            return Err(ModuleError::DestroyFailed {
                module: key.clone(),
                source: Box::new(source),
            });
        }

        info!(module = %key, reason = %reason, "module unloaded");
        Ok(stopped)
    }

    /// Unload every module in reverse load order with
    /// [`StopReason::AppQuit`].
    ///
    /// Failures are logged and do not stop the drain. Returns the number of
    /// modules unloaded.
    pub async fn shutdown(self: &Arc<Self>) -> usize {
        let keys = self.list_modules();
        info!(count = keys.len(), "draining modules");

        let mut drained: usize = 0;
        for key in keys.iter().rev() {
            if let Err(e) = self.unload_module(key, StopReason::AppQuit).await {
                error!(module = %key, error = %e, "module failed to unload cleanly");
            }
            drained = drained.saturating_add(1);
        }
        drained
    }

    /// Typed lookup through a [`ModuleType`]'s static key.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingIdentity`] if `T` declares no key.
    pub fn get<T: ModuleType>(&self) -> ModuleResult<Option<Arc<T>>> {
        let key = T::module_key().ok_or(ModuleError::MissingIdentity {
            type_name: std::any::type_name::<T>(),
        })?;

        Ok(self
            .get_module(&key)
            .and_then(|module| AsAnyArc::into_any_arc(module).downcast::<T>().ok()))
    }

    /// Look up a loaded module.
    #[must_use]
    pub fn get_module(&self, key: &ModuleKey) -> Option<Arc<dyn Module>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
    }

    /// Whether `key` is loaded.
    #[must_use]
    pub fn has_module(&self, key: &ModuleKey) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Loaded keys, in load order.
    #[must_use]
    pub fn list_modules(&self) -> Vec<ModuleKey> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
    }

    /// Loaded modules, in load order.
    #[must_use]
    pub fn get_all_modules(&self) -> Vec<Arc<dyn Module>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .modules()
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no modules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The host application.
    #[must_use]
    pub fn app(&self) -> &Arc<dyn HostApp> {
        &self.app
    }

    /// Directory module storage defaults to.
    #[must_use]
    pub fn modules_root(&self) -> &Path {
        &self.modules_root
    }

    /// The event bus, if configured.
    #[must_use]
    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    fn base_context(self: &Arc<Self>, key: ModuleKey, storage: Option<StorageDir>) -> BaseContext {
        BaseContext {
            app: Arc::clone(&self.app),
            manager: Arc::clone(self),
            key,
            config: self.config.clone(),
            events: self.events.clone(),
            channel: self.channel.clone(),
            storage,
        }
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        self.detach_quit_listener();
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules_root", &self.modules_root)
            .field("modules", &self.list_modules())
            .field("has_events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}
