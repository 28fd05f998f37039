//! Load and unload sequencing across the manager, registry and hooks.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use stagehand_modules::prelude::*;
use stagehand_modules::{LoadOptions, ManagerConfig};
use stagehand_test::{CallLog, RecordingModule, TestHost, test_host_app};

#[tokio::test]
async fn test_failed_created_then_stop_failure_on_unload() {
    let host = TestHost::new();
    let log = CallLog::new();

    let x = RecordingModule::new("X", &log).failing_at(LifecyclePhase::Created, "boom-created");
    assert!(!host.manager.load_module(x.definition()).await.unwrap());
    assert!(!host.manager.has_module(x.key()));
    assert_eq!(log.hooks_for("X"), ["created", "destroy"]);

    let y = RecordingModule::new("Y", &log)
        .with_hooks(&[LifecyclePhase::Stop])
        .failing_at(LifecyclePhase::Stop, "boom-stop");
    assert!(host.manager.load_module(y.definition()).await.unwrap());
    assert!(!host.manager.unload(y.key()).await.unwrap());
    assert!(!host.manager.has_module(y.key()));
    assert_eq!(log.hooks_for("Y"), ["init", "stop", "destroy"]);
}

#[tokio::test]
async fn test_rollback_calls_exactly_the_earned_cleanup() {
    let cases = [
        (LifecyclePhase::Created, vec!["created", "destroy"]),
        (LifecyclePhase::Init, vec!["created", "init", "destroy"]),
        (
            LifecyclePhase::Start,
            vec!["created", "init", "start", "stop", "destroy"],
        ),
    ];

    for (phase, expected) in cases {
        let host = TestHost::new();
        let log = CallLog::new();
        let module = RecordingModule::new("m", &log).failing_at(phase, format!("boom-{phase}"));

        assert!(!host.manager.load_module(module.definition()).await.unwrap());
        assert!(!host.manager.has_module(module.key()));
        assert_eq!(log.hooks_for("m"), expected, "failing {phase}");
    }
}

#[tokio::test]
async fn test_start_failure_without_stop_hook_only_destroys() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("m", &log)
        .with_hooks(&[LifecyclePhase::Start])
        .failing_at(LifecyclePhase::Start, "boom-start");

    assert!(!host.manager.load_module(module.definition()).await.unwrap());
    assert_eq!(log.hooks_for("m"), ["init", "start", "destroy"]);
}

#[tokio::test]
async fn test_load_is_idempotent() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("m", &log);

    assert!(host.manager.load_module(module.definition()).await.unwrap());
    let calls = log.len();

    assert!(!host.manager.load_module(module.definition()).await.unwrap());
    assert_eq!(log.len(), calls);
    assert_eq!(host.manager.len(), 1);
}

#[tokio::test]
async fn test_registration_is_all_or_nothing() {
    let host = TestHost::new();
    let log = CallLog::new();
    let modules = vec![
        RecordingModule::new("ok-1", &log),
        RecordingModule::new("bad-created", &log).failing_at(LifecyclePhase::Created, "x"),
        RecordingModule::new("ok-2", &log),
        RecordingModule::new("bad-init", &log).failing_at(LifecyclePhase::Init, "x"),
        RecordingModule::new("bad-start", &log).failing_at(LifecyclePhase::Start, "x"),
        RecordingModule::new("bad-stop", &log).failing_at(LifecyclePhase::Stop, "x"),
    ];

    let results = common::load_all(&host, &modules).await;
    for (module, loaded) in modules.iter().zip(&results) {
        assert_eq!(host.manager.has_module(module.key()), *loaded, "{}", module.key());
    }
    assert_eq!(results, [true, false, true, false, false, true]);
    assert_eq!(host.manager.list_modules().len(), 3);
}

#[tokio::test]
async fn test_unload_destroy_failure_still_removes() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("m", &log).failing_at(LifecyclePhase::Destroy, "boom-destroy");
    host.manager.load_module(module.definition()).await.unwrap();

    let err = host.manager.unload(module.key()).await.unwrap_err();
    assert!(err.to_string().contains("boom-destroy"));
    assert!(!host.manager.has_module(module.key()));
    assert_eq!(log.hooks_for("m").last(), Some(&"destroy"));
}

#[tokio::test]
async fn test_unloaded_module_can_load_again() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("m", &log);

    assert!(host.manager.load_module(module.definition()).await.unwrap());
    assert!(host.manager.unload(module.key()).await.unwrap());
    assert!(host.manager.load_module(module.definition()).await.unwrap());
    assert_eq!(
        log.hooks_for("m"),
        ["created", "init", "start", "stop", "destroy", "created", "init", "start"]
    );
}

#[tokio::test]
async fn test_load_options_and_reasons_reach_hooks() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("m", &log);

    let options = LoadOptions::default()
        .hot_reload()
        .with_start_args(serde_json::json!({ "workers": 2 }));
    host.manager
        .load_module_with(module.definition(), options)
        .await
        .unwrap();
    host.manager
        .unload_module(module.key(), StopReason::Normal)
        .await
        .unwrap();

    let seen = module.observed();
    assert_eq!(seen.hot_reload, Some(true));
    assert_eq!(seen.dependencies_ready, Some(true));
    assert_eq!(seen.start_args, Some(serde_json::json!({ "workers": 2 })));
    assert_eq!(seen.stop_reason, Some(StopReason::Normal));
    assert_eq!(seen.app_closing, Some(false));
}

static COUNTER_KEY: LazyLock<ModuleKey> = LazyLock::new(|| ModuleKey::new("counter"));

/// Counts how often `bump` is called by siblings.
struct Counter {
    hits: AtomicU32,
}

impl Counter {
    fn bump(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Module for Counter {
    fn key(&self) -> &ModuleKey {
        &COUNTER_KEY
    }

    async fn init(&self, _ctx: &InitContext) -> ModuleResult<()> {
        Ok(())
    }

    async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for Counter {
    fn module_key() -> Option<ModuleKey> {
        Some(COUNTER_KEY.clone())
    }

    fn construct(_ctx: &CreateContext) -> ModuleResult<Self> {
        Ok(Self {
            hits: AtomicU32::new(0),
        })
    }
}

/// Shared value handed to every module as the communication channel.
struct Bridge {
    messages: Mutex<Vec<String>>,
}

/// Reads its settings, bumps the counter and writes to the bridge.
struct Client {
    key: ModuleKey,
    limit: AtomicU32,
}

#[async_trait]
impl Module for Client {
    fn key(&self) -> &ModuleKey {
        &self.key
    }

    async fn init(&self, ctx: &InitContext) -> ModuleResult<()> {
        let limit = ctx
            .module_settings()
            .get_as::<u32>("limit")?
            .unwrap_or_default();
        self.limit.store(limit, Ordering::SeqCst);

        let counter = ctx
            .sibling::<Counter>()?
            .ok_or_else(|| ModuleError::failed("counter not loaded"))?;
        counter.bump();

        if let Some(bridge) = ctx.channel_as::<Bridge>() {
            bridge.messages.lock().unwrap().push(format!("{} ready", ctx.key));
        }
        Ok(())
    }

    async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_modules_share_config_channel_and_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Arc::new(Bridge {
        messages: Mutex::new(Vec::new()),
    });
    let manager = ModuleManager::new(
        test_host_app(dir.path()),
        ManagerConfig::default()
            .with_config(common::reader("[settings.client]\nlimit = 12\n"))
            .with_channel(Arc::clone(&bridge) as Arc<dyn std::any::Any + Send + Sync>),
    );

    let client = Arc::new(Client {
        key: ModuleKey::new("client"),
        limit: AtomicU32::new(0),
    });
    let early = ModuleDefinition::Instance(Arc::clone(&client) as Arc<dyn Module>);
    assert!(!manager.load_module(early).await.unwrap());

    assert!(manager
        .load_module(ModuleDefinition::of::<Counter>().unwrap())
        .await
        .unwrap());
    let late = ModuleDefinition::Instance(Arc::clone(&client) as Arc<dyn Module>);
    assert!(manager.load_module(late).await.unwrap());

    assert_eq!(client.limit.load(Ordering::SeqCst), 12);
    let counter = manager.get::<Counter>().unwrap().unwrap();
    assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    assert_eq!(*bridge.messages.lock().unwrap(), ["client ready"]);
}
