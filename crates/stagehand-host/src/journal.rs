//! Journal module: appends every bus event to `events.log` in its storage.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use stagehand_events::HostEvent;
use stagehand_modules::prelude::*;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Name of the log file inside the journal's storage directory.
pub const JOURNAL_FILE: &str = "events.log";

static JOURNAL_KEY: LazyLock<ModuleKey> = LazyLock::new(|| ModuleKey::new("journal"));

/// Records host events as JSON lines.
#[derive(Debug, Default)]
pub struct Journal {
    task: Mutex<Option<JoinHandle<()>>>,
    written: Arc<AtomicU64>,
    path: Mutex<Option<PathBuf>>,
}

impl Journal {
    /// Number of events written since the module started.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    /// Path of the log file, once `init` has run.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
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

async fn append(path: &Path, event: &HostEvent) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event).map_err(std::io::Error::other)?;
    line.push(b'\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await
}

#[async_trait]
impl Module for Journal {
    fn key(&self) -> &ModuleKey {
        &JOURNAL_KEY
    }

    fn file_config(&self) -> Option<ModuleFileConfig> {
        Some(ModuleFileConfig::new())
    }

    fn hooks(&self) -> Option<&dyn ModuleHooks> {
        Some(self)
    }

    async fn init(&self, ctx: &InitContext) -> ModuleResult<()> {
        let storage = ctx
            .storage
            .as_ref()
            .ok_or_else(|| ModuleError::failed("journal requires a storage directory"))?;
        let path = storage.join([JOURNAL_FILE])?;
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = Some(path);
        Ok(())
    }

    async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
        self.halt();
        Ok(())
    }
}

#[async_trait]
impl ModuleHooks for Journal {
    async fn start(&self, ctx: &StartContext) -> ModuleResult<()> {
        let Some(events) = &ctx.events else {
            debug!("no event bus, journal idle");
            return Ok(());
        };
        let path = self
            .log_path()
            .ok_or_else(|| ModuleError::failed("journal started before init"))?;

        let mut receiver = events.subscribe();
        let written = Arc::clone(&self.written);
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match append(&path, &event).await {
                    Ok(()) => {
                        written.fetch_add(1, Ordering::SeqCst);
                    },
                    Err(e) => warn!(event = %event.name, error = %e, "failed to journal event"),
                }
            }
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    async fn stop(&self, ctx: &StopContext) -> ModuleResult<()> {
        debug!(reason = %ctx.reason, written = self.written(), "journal stopping");
        self.halt();
        Ok(())
    }
}

impl ModuleType for Journal {
    fn module_key() -> Option<ModuleKey> {
        Some(JOURNAL_KEY.clone())
    }

    fn construct(_ctx: &CreateContext) -> ModuleResult<Self> {
        Ok(Self::default())
    }
}
