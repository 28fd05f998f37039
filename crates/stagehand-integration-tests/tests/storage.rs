//! Storage directory provisioning across the lifecycle.

mod common;

use stagehand_modules::prelude::*;
use stagehand_modules::ManagerConfig;
use stagehand_test::{CallLog, RecordingModule, TestHost, test_host_app};

#[tokio::test]
async fn test_declared_storage_is_created_before_hooks() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("search", &log).with_file_config(ModuleFileConfig::new());

    assert!(host.manager.load_module(module.definition()).await.unwrap());

    let dir = host.root().join("modules").join("search");
    assert!(dir.is_dir());
    let seen = module.observed();
    assert_eq!(seen.storage, vec![Some(dir.clone()); 3]);
    assert_eq!(seen.entry_path, Some(dir.join("index")));
}

#[tokio::test]
async fn test_disabled_or_missing_storage_provisions_nothing() {
    let host = TestHost::new();
    let log = CallLog::new();
    let disabled =
        RecordingModule::new("quiet", &log).with_file_config(ModuleFileConfig::disabled());
    let undeclared = RecordingModule::new("plain", &log);

    for module in [&disabled, &undeclared] {
        assert!(host.manager.load_module(module.definition()).await.unwrap());
        host.manager.unload(module.key()).await.unwrap();

        let seen = module.observed();
        assert_eq!(seen.storage.len(), 5);
        assert!(seen.storage.iter().all(Option::is_none));
        assert_eq!(seen.entry_path, None);
    }
    assert!(!host.root().join("modules").exists());
}

#[tokio::test]
async fn test_dir_name_and_root_overrides() {
    let host = TestHost::new();
    let elsewhere = tempfile::tempdir().unwrap();
    let log = CallLog::new();
    let renamed = RecordingModule::new("renamed", &log)
        .with_file_config(ModuleFileConfig::new().with_dir_name("data"));
    let moved = RecordingModule::new("moved", &log)
        .with_file_config(ModuleFileConfig::new().with_root(elsewhere.path()));

    common::load_all(&host, &[renamed, moved]).await;

    assert!(host.root().join("modules").join("data").is_dir());
    assert!(elsewhere.path().join("moved").is_dir());
    assert!(!host.root().join("modules").join("moved").exists());
}

#[tokio::test]
async fn test_explicit_entry_path_wins() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("web", &log)
        .with_file_config(ModuleFileConfig::new())
        .with_entry_path("/srv/web/main");

    host.manager.load_module(module.definition()).await.unwrap();
    assert_eq!(
        module.observed().entry_path,
        Some(std::path::PathBuf::from("/srv/web/main"))
    );
}

#[tokio::test]
async fn test_files_outlive_the_module() {
    let host = TestHost::new();
    let log = CallLog::new();
    let module = RecordingModule::new("notes", &log).with_file_config(ModuleFileConfig::new());
    host.manager.load_module(module.definition()).await.unwrap();

    let dir = StorageDir::new(host.root().join("modules").join("notes"));
    dir.write_file("drafts/today.md", "hello").await.unwrap();

    host.quit().await;

    assert!(dir.exists().await);
    assert_eq!(dir.read_to_string("drafts/today.md").await.unwrap(), "hello");

    // A reload sees the same directory and its contents.
    host.manager.load_module(module.definition()).await.unwrap();
    assert_eq!(dir.list().await, ["drafts"]);
}

#[tokio::test]
async fn test_modules_root_from_config() {
    let app = tempfile::tempdir().unwrap();
    let config: stagehand_config::HostConfig =
        toml::from_str("[modules]\nroot = \"state/mods\"\n").unwrap();
    let manager = ModuleManager::new(
        test_host_app(app.path()),
        ManagerConfig::from_host_config(&config, app.path(), common::reader("")),
    );
    assert_eq!(manager.modules_root(), app.path().join("state/mods"));

    let log = CallLog::new();
    let module = RecordingModule::new("cache", &log).with_file_config(ModuleFileConfig::new());
    manager.load_module(module.definition()).await.unwrap();

    assert!(app.path().join("state").join("mods").join("cache").is_dir());
}

#[tokio::test]
async fn test_storage_failure_runs_no_hooks() {
    let host = TestHost::new();
    std::fs::write(host.root().join("modules"), b"not a directory").unwrap();
    let log = CallLog::new();
    let module = RecordingModule::new("blocked", &log).with_file_config(ModuleFileConfig::new());

    let err = host.manager.load_module(module.definition()).await.unwrap_err();
    assert!(matches!(err, ModuleError::Storage(_)));
    assert!(log.is_empty());
    assert!(!host.manager.has_module(module.key()));
}
