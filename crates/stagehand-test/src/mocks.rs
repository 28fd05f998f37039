//! Mock modules for testing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use stagehand_modules::{
    BaseContext, CreateContext, DestroyContext, InitContext, LifecyclePhase, Module,
    ModuleDefinition, ModuleError, ModuleFileConfig, ModuleHooks, ModuleKey, ModuleResult,
    StartContext, StopContext, StopReason,
};

/// One hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Display name of the module's key.
    pub module: String,
    /// The hook that ran.
    pub phase: LifecyclePhase,
}

/// Shared, ordered record of hook calls across any number of modules.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call.
    pub fn record(&self, key: &ModuleKey, phase: LifecyclePhase) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CallRecord {
                module: key.to_string(),
                phase,
            });
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hook names called on `module`, in order.
    #[must_use]
    pub fn hooks_for(&self, module: &str) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| c.module == module)
            .map(|c| c.phase.as_str())
            .collect()
    }

    /// Modules that received `phase`, in order.
    #[must_use]
    pub fn modules_for(&self, phase: LifecyclePhase) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.phase == phase)
            .map(|c| c.module)
            .collect()
    }

    /// Number of calls recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every call.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// What a [`RecordingModule`] saw in its contexts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    /// Storage path seen by each recorded hook, in call order.
    pub storage: Vec<Option<PathBuf>>,
    /// Entry path from the create context.
    pub entry_path: Option<PathBuf>,
    /// `hot_reload` from the create context.
    pub hot_reload: Option<bool>,
    /// `dependencies_ready` from the init context.
    pub dependencies_ready: Option<bool>,
    /// Arguments from the start context.
    pub start_args: Option<Value>,
    /// Reason from the most recent stop context.
    pub stop_reason: Option<StopReason>,
    /// `app_closing` from the most recent destroy context.
    pub app_closing: Option<bool>,
}

/// A module that records each hook call and can fail on demand.
///
/// Clones share the key, the log and the observations, so a test can keep
/// a clone to inspect after handing one to the manager.
#[derive(Debug, Clone)]
pub struct RecordingModule {
    key: ModuleKey,
    log: CallLog,
    optional_hooks: Option<Vec<LifecyclePhase>>,
    failures: HashMap<LifecyclePhase, String>,
    file: Option<ModuleFileConfig>,
    entry_path: Option<PathBuf>,
    observed: Arc<Mutex<Observations>>,
}

impl RecordingModule {
    /// A module labelled `label` with all three optional hooks.
    #[must_use]
    pub fn new(label: &str, log: &CallLog) -> Self {
        Self::with_key(ModuleKey::new(label), log)
    }

    /// A module with an existing key.
    #[must_use]
    pub fn with_key(key: ModuleKey, log: &CallLog) -> Self {
        Self {
            key,
            log: log.clone(),
            optional_hooks: Some(vec![
                LifecyclePhase::Created,
                LifecyclePhase::Start,
                LifecyclePhase::Stop,
            ]),
            failures: HashMap::new(),
            file: None,
            entry_path: None,
            observed: Arc::new(Mutex::new(Observations::default())),
        }
    }

    /// Only implement the listed optional hooks. The others act as absent.
    #[must_use]
    pub fn with_hooks(mut self, hooks: &[LifecyclePhase]) -> Self {
        self.optional_hooks = Some(hooks.to_vec());
        self
    }

    /// Implement no optional hooks at all.
    #[must_use]
    pub fn without_hooks(mut self) -> Self {
        self.optional_hooks = None;
        self
    }

    /// Fail `phase` with `message`.
    #[must_use]
    pub fn failing_at(mut self, phase: LifecyclePhase, message: impl Into<String>) -> Self {
        self.failures.insert(phase, message.into());
        self
    }

    /// Declare storage.
    #[must_use]
    pub fn with_file_config(mut self, file: ModuleFileConfig) -> Self {
        self.file = Some(file);
        self
    }

    /// Declare an explicit entry path.
    #[must_use]
    pub fn with_entry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry_path = Some(path.into());
        self
    }

    /// The module's key.
    #[must_use]
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// A definition wrapping a clone of this module.
    #[must_use]
    pub fn definition(&self) -> ModuleDefinition {
        ModuleDefinition::instance(self.clone())
    }

    /// Snapshot of what the module has seen.
    #[must_use]
    pub fn observed(&self) -> Observations {
        self.observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn has_hook(&self, phase: LifecyclePhase) -> bool {
        self.optional_hooks
            .as_ref()
            .is_some_and(|hooks| hooks.contains(&phase))
    }

    fn observe(&self, f: impl FnOnce(&mut Observations)) {
        f(&mut self.observed.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn call(
        &self,
        phase: LifecyclePhase,
        ctx: &BaseContext,
        f: impl FnOnce(&mut Observations),
    ) -> ModuleResult<()> {
        self.log.record(&self.key, phase);
        let storage = ctx.storage.as_ref().map(|dir| dir.path().to_path_buf());
        self.observe(|o| {
            o.storage.push(storage);
            f(o);
        });

        match self.failures.get(&phase) {
            Some(message) => Err(ModuleError::failed(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn key(&self) -> &ModuleKey {
        &self.key
    }

    fn file_config(&self) -> Option<ModuleFileConfig> {
        self.file.clone()
    }

    fn entry_path(&self) -> Option<PathBuf> {
        self.entry_path.clone()
    }

    fn hooks(&self) -> Option<&dyn ModuleHooks> {
        self.optional_hooks.as_ref().map(|_| self as &dyn ModuleHooks)
    }

    async fn init(&self, ctx: &InitContext) -> ModuleResult<()> {
        self.call(LifecyclePhase::Init, ctx, |o| {
            o.dependencies_ready = Some(ctx.dependencies_ready);
        })
    }

    async fn destroy(&self, ctx: &DestroyContext) -> ModuleResult<()> {
        self.call(LifecyclePhase::Destroy, ctx, |o| {
            o.app_closing = Some(ctx.app_closing);
        })
    }
}

#[async_trait]
impl ModuleHooks for RecordingModule {
    async fn created(&self, ctx: &CreateContext) -> ModuleResult<()> {
        if !self.has_hook(LifecyclePhase::Created) {
            return Ok(());
        }
        self.call(LifecyclePhase::Created, ctx, |o| {
            o.entry_path.clone_from(&ctx.entry_path);
            o.hot_reload = Some(ctx.hot_reload);
        })
    }

    async fn start(&self, ctx: &StartContext) -> ModuleResult<()> {
        if !self.has_hook(LifecyclePhase::Start) {
            return Ok(());
        }
        self.call(LifecyclePhase::Start, ctx, |o| {
            o.start_args = Some(ctx.args.clone());
        })
    }

    async fn stop(&self, ctx: &StopContext) -> ModuleResult<()> {
        if !self.has_hook(LifecyclePhase::Stop) {
            return Ok(());
        }
        self.call(LifecyclePhase::Stop, ctx, |o| {
            o.stop_reason = Some(ctx.reason);
        })
    }
}
