//! Module trait and core types.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{CreateContext, DestroyContext, InitContext, StartContext, StopContext};
use crate::error::{ModuleError, ModuleResult};
use crate::key::ModuleKey;
use crate::storage::ModuleFileConfig;

/// Upcast an `Arc<Self>` to `Arc<dyn Any>` for typed lookups.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAnyArc: Any + Send + Sync {
    /// Convert into a type-erased `Arc`.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A unit of host functionality managed by the
/// [`ModuleManager`](crate::ModuleManager).
///
/// `init` and `destroy` are mandatory. `created`, `start` and `stop` live on
/// [`ModuleHooks`]; a module that has any of them returns itself from
/// [`hooks`](Self::hooks).
///
/// Hooks take `&self`. Keep mutable state behind a lock or atomic.
#[async_trait]
pub trait Module: AsAnyArc {
    /// The module's identity.
    fn key(&self) -> &ModuleKey;

    /// Storage declaration. `None` means no directory.
    fn file_config(&self) -> Option<ModuleFileConfig> {
        None
    }

    /// Explicit entry path. When `None`, modules with storage get
    /// `<dir>/index`.
    fn entry_path(&self) -> Option<PathBuf> {
        None
    }

    /// Optional lifecycle hooks.
    fn hooks(&self) -> Option<&dyn ModuleHooks> {
        None
    }

    /// Called after `created`, before `start`.
    async fn init(&self, ctx: &InitContext) -> ModuleResult<()>;

    /// Always the last call a module receives, on success and rollback paths.
    async fn destroy(&self, ctx: &DestroyContext) -> ModuleResult<()>;
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("key", self.key())
            .field("has_hooks", &self.hooks().is_some())
            .finish_non_exhaustive()
    }
}

/// Optional lifecycle hooks. Every method defaults to a no-op success.
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    /// Called once right after construction, before `init`.
    async fn created(&self, ctx: &CreateContext) -> ModuleResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called after `init` succeeds.
    async fn start(&self, ctx: &StartContext) -> ModuleResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Counterpart of `start`; runs on unload and when `start` fails.
    async fn stop(&self, ctx: &StopContext) -> ModuleResult<()> {
        let _ = ctx;
        Ok(())
    }
}

/// A module type the manager can construct and look up by type.
pub trait ModuleType: Module + Sized {
    /// The type's static key, or `None` if it has none.
    fn module_key() -> Option<ModuleKey>;

    /// Build an instance. Receives a create context without storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be built.
    fn construct(ctx: &CreateContext) -> ModuleResult<Self>;
}

/// Boxed constructor used by [`ModuleDefinition::Constructor`].
pub type ModuleConstructor =
    Box<dyn FnOnce(&CreateContext) -> ModuleResult<Arc<dyn Module>> + Send>;

/// What the host hands to [`load_module`](crate::ModuleManager::load_module).
pub enum ModuleDefinition {
    /// A pre-built instance.
    Instance(Arc<dyn Module>),
    /// Build the instance at load time.
    Constructor {
        /// Key the constructor's context is built for.
        key: ModuleKey,
        /// The constructor.
        construct: ModuleConstructor,
    },
}

impl ModuleDefinition {
    /// Wrap a pre-built instance.
    pub fn instance<M: Module>(module: M) -> Self {
        Self::Instance(Arc::new(module))
    }

    /// Build from a closure.
    pub fn constructor<F>(key: ModuleKey, construct: F) -> Self
    where
        F: FnOnce(&CreateContext) -> ModuleResult<Arc<dyn Module>> + Send + 'static,
    {
        Self::Constructor {
            key,
            construct: Box::new(construct),
        }
    }

    /// Build from a [`ModuleType`].
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingIdentity`] if `T` declares no key.
    pub fn of<T: ModuleType>() -> ModuleResult<Self> {
        let key = T::module_key().ok_or(ModuleError::MissingIdentity {
            type_name: std::any::type_name::<T>(),
        })?;
        Ok(Self::constructor(key, |ctx| {
            T::construct(ctx).map(|m| Arc::new(m) as Arc<dyn Module>)
        }))
    }

    /// The key the definition loads under.
    ///
    /// For constructors this is the declared key; the built instance is
    /// expected to report the same one.
    #[must_use]
    pub fn key(&self) -> &ModuleKey {
        match self {
            Self::Instance(module) => module.key(),
            Self::Constructor { key, .. } => key,
        }
    }
}

impl From<Arc<dyn Module>> for ModuleDefinition {
    fn from(module: Arc<dyn Module>) -> Self {
        Self::Instance(module)
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(module) => f.debug_tuple("Instance").field(module.key()).finish(),
            Self::Constructor { key, .. } => {
                f.debug_struct("Constructor").field("key", key).finish_non_exhaustive()
            },
        }
    }
}

/// Per-load options forwarded into the lifecycle contexts.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Set on the create context; the module is being reloaded in place.
    pub hot_reload: bool,
    /// Set on the init context.
    pub dependencies_ready: bool,
    /// Passed to `start`.
    pub start_args: serde_json::Value,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            hot_reload: false,
            dependencies_ready: true,
            start_args: serde_json::Value::Null,
        }
    }
}

impl LoadOptions {
    /// Mark the load as a hot reload.
    #[must_use]
    pub fn hot_reload(mut self) -> Self {
        self.hot_reload = true;
        self
    }

    /// Set the `dependencies_ready` flag.
    #[must_use]
    pub fn with_dependencies_ready(mut self, ready: bool) -> Self {
        self.dependencies_ready = ready;
        self
    }

    /// Set the `start` arguments.
    #[must_use]
    pub fn with_start_args(mut self, args: serde_json::Value) -> Self {
        self.start_args = args;
        self
    }
}

/// A lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// [`ModuleHooks::created`].
    Created,
    /// [`Module::init`].
    Init,
    /// [`ModuleHooks::start`].
    Start,
    /// [`ModuleHooks::stop`].
    Stop,
    /// [`Module::destroy`].
    Destroy,
}

impl LifecyclePhase {
    /// Lowercase hook name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keyless;

    #[async_trait]
    impl Module for Keyless {
        fn key(&self) -> &ModuleKey {
            unreachable!("never loaded")
        }

        async fn init(&self, _ctx: &InitContext) -> ModuleResult<()> {
            Ok(())
        }

        async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
            Ok(())
        }
    }

    impl ModuleType for Keyless {
        fn module_key() -> Option<ModuleKey> {
            None
        }

        fn construct(_ctx: &CreateContext) -> ModuleResult<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_of_requires_a_key() {
        let err = ModuleDefinition::of::<Keyless>().unwrap_err();
        assert!(matches!(err, ModuleError::MissingIdentity { .. }));
        assert!(err.to_string().contains("Keyless"));
    }

    #[test]
    fn test_constructor_definition_reports_its_key() {
        let key = ModuleKey::new("built");
        let def = ModuleDefinition::constructor(key.clone(), |_| Err(ModuleError::failed("no")));
        assert_eq!(def.key(), &key);
        assert!(format!("{def:?}").starts_with("Constructor"));
    }

    #[test]
    fn test_load_options_defaults() {
        let options = LoadOptions::default();
        assert!(!options.hot_reload);
        assert!(options.dependencies_ready);
        assert_eq!(options.start_args, serde_json::Value::Null);

        let options = options.with_dependencies_ready(false).hot_reload();
        assert!(options.hot_reload);
        assert!(!options.dependencies_ready);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(LifecyclePhase::Created.to_string(), "created");
        assert_eq!(LifecyclePhase::Destroy.as_str(), "destroy");
    }
}
