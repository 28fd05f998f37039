//! Heartbeat module: emits `heartbeat:tick` on the bus at a fixed interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

use stagehand_modules::prelude::*;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Event emitted on every beat. Payload: `{ "beat": <n> }`.
pub const HEARTBEAT_EVENT: &str = "heartbeat:tick";

/// Interval used when `[settings.heartbeat] interval_ms` is unset.
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

static HEARTBEAT_KEY: LazyLock<ModuleKey> = LazyLock::new(|| ModuleKey::new("heartbeat"));

/// Periodic liveness signal.
#[derive(Debug)]
pub struct Heartbeat {
    interval_ms: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval_ms: AtomicU64::new(DEFAULT_INTERVAL_MS),
            task: Mutex::new(None),
        }
    }
}

impl Heartbeat {
    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Whether the ticker task is running.
    #[must_use]
    pub fn is_beating(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn halt(&self) {
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

#[async_trait]
impl Module for Heartbeat {
    fn key(&self) -> &ModuleKey {
        &HEARTBEAT_KEY
    }

    fn hooks(&self) -> Option<&dyn ModuleHooks> {
        Some(self)
    }

    async fn init(&self, ctx: &InitContext) -> ModuleResult<()> {
        let interval_ms = ctx
            .module_settings()
            .get_as::<u64>("interval_ms")?
            .unwrap_or(DEFAULT_INTERVAL_MS);
        if interval_ms == 0 {
            return Err(ModuleError::failed("heartbeat interval_ms must be positive"));
        }
        self.interval_ms.store(interval_ms, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
        self.halt();
        Ok(())
    }
}

#[async_trait]
impl ModuleHooks for Heartbeat {
    async fn start(&self, ctx: &StartContext) -> ModuleResult<()> {
        let Some(events) = ctx.events.clone() else {
            debug!("no event bus, heartbeat idle");
            return Ok(());
        };

        let period = self.interval();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut beat: u64 = 0;
            loop {
                ticker.tick().await;
                beat = beat.saturating_add(1);
                events.emit(HEARTBEAT_EVENT, serde_json::json!({ "beat": beat }));
            }
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    async fn stop(&self, _ctx: &StopContext) -> ModuleResult<()> {
        self.halt();
        Ok(())
    }
}

impl ModuleType for Heartbeat {
    fn module_key() -> Option<ModuleKey> {
        Some(HEARTBEAT_KEY.clone())
    }

    fn construct(_ctx: &CreateContext) -> ModuleResult<Self> {
        Ok(Self::default())
    }
}
