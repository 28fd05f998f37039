//! Test fixtures for hosts and managers.

use std::path::Path;
use std::sync::Arc;

use stagehand_config::ConfigReader;
use stagehand_events::EventBus;
use stagehand_modules::{BasicHostApp, HostApp, ManagerConfig, ModuleManager};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Quit event used by [`TestHost`].
pub const TEST_QUIT_EVENT: &str = "app:before-quit";

/// Create a host application rooted at `root`.
#[must_use]
pub fn test_host_app(root: &Path) -> Arc<dyn HostApp> {
    Arc::new(BasicHostApp::new(root).with_name("stagehand-test"))
}

/// Create a manager rooted at `root` with no event bus.
#[must_use]
pub fn test_manager(root: &Path) -> Arc<ModuleManager> {
    ModuleManager::new(test_host_app(root), ManagerConfig::default())
}

/// Install a test-friendly subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A manager wired to an event bus, rooted in a temporary directory.
///
/// Must be created inside a Tokio runtime so the quit listener attaches.
pub struct TestHost {
    /// Application root. Removed on drop.
    pub dir: TempDir,
    /// The bus the manager listens on.
    pub bus: EventBus,
    /// The manager under test.
    pub manager: Arc<ModuleManager>,
}

impl TestHost {
    /// Create a host listening for [`TEST_QUIT_EVENT`].
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ConfigReader::empty())
    }

    /// Create a host whose modules read `config`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_config(config: ConfigReader) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let bus = EventBus::new();
        let manager = ModuleManager::new(
            test_host_app(dir.path()),
            ManagerConfig::default()
                .with_event_bus(bus.clone())
                .with_quit_event(TEST_QUIT_EVENT)
                .with_config(config),
        );
        Self { dir, bus, manager }
    }

    /// The application root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Emit the quit event and wait for the drain to finish.
    pub async fn quit(&self) {
        self.bus.emit(TEST_QUIT_EVENT, serde_json::Value::Null);
        self.manager.wait_for_shutdown().await;
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}
