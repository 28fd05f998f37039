//! Reverse-order drain triggered by the quit event.

mod common;

use stagehand_modules::prelude::*;
use stagehand_test::{CallLog, RecordingModule, TEST_QUIT_EVENT, TestHost};

fn three(log: &CallLog) -> Vec<RecordingModule> {
    ["A", "B", "C"]
        .into_iter()
        .map(|label| RecordingModule::new(label, log))
        .collect()
}

#[tokio::test]
async fn test_quit_unloads_in_reverse_load_order() {
    let host = TestHost::new();
    let log = CallLog::new();
    let modules = three(&log);
    common::load_all(&host, &modules).await;
    assert_eq!(host.manager.list_modules(), common::keys(&modules));

    host.quit().await;

    assert!(host.manager.is_empty());
    assert_eq!(log.modules_for(LifecyclePhase::Stop), ["C", "B", "A"]);
    assert_eq!(log.modules_for(LifecyclePhase::Destroy), ["C", "B", "A"]);
    for module in &modules {
        let seen = module.observed();
        assert_eq!(seen.stop_reason, Some(StopReason::AppQuit));
        assert_eq!(seen.app_closing, Some(true));
    }
}

#[tokio::test]
async fn test_failing_module_does_not_block_the_drain() {
    let host = TestHost::new();
    let log = CallLog::new();
    let modules = vec![
        RecordingModule::new("A", &log),
        RecordingModule::new("B", &log)
            .failing_at(LifecyclePhase::Stop, "boom-stop")
            .failing_at(LifecyclePhase::Destroy, "boom-destroy"),
        RecordingModule::new("C", &log),
    ];
    common::load_all(&host, &modules).await;

    host.quit().await;

    assert!(host.manager.is_empty());
    assert_eq!(log.modules_for(LifecyclePhase::Destroy), ["C", "B", "A"]);
}

#[tokio::test]
async fn test_second_quit_finds_nothing_to_unload() {
    let host = TestHost::new();
    let log = CallLog::new();
    common::load_all(&host, &three(&log)).await;

    host.quit().await;
    let calls = log.len();
    host.quit().await;

    assert_eq!(log.len(), calls);
}

#[tokio::test]
async fn test_other_events_are_ignored() {
    let host = TestHost::new();
    let log = CallLog::new();
    common::load_all(&host, &three(&log)).await;

    host.bus.emit("app:ready", serde_json::Value::Null);
    host.manager.wait_for_shutdown().await;

    assert_eq!(host.manager.len(), 3);
    assert!(log.modules_for(LifecyclePhase::Stop).is_empty());
}

#[tokio::test]
async fn test_direct_shutdown_counts_unloaded_modules() {
    let host = TestHost::new();
    let log = CallLog::new();
    common::load_all(&host, &three(&log)).await;

    assert_eq!(host.manager.shutdown().await, 3);
    assert_eq!(host.manager.shutdown().await, 0);
    assert_eq!(log.modules_for(LifecyclePhase::Destroy), ["C", "B", "A"]);
}

#[tokio::test]
async fn test_detached_manager_ignores_quit() {
    let host = TestHost::new();
    let log = CallLog::new();
    common::load_all(&host, &three(&log)).await;

    assert!(host.manager.detach_quit_listener());
    host.bus.emit(TEST_QUIT_EVENT, serde_json::Value::Null);
    host.manager.wait_for_shutdown().await;

    assert_eq!(host.manager.len(), 3);
}

#[tokio::test]
async fn test_modules_loaded_after_quit_stay_loaded() {
    let host = TestHost::new();
    let log = CallLog::new();
    common::load_all(&host, &three(&log)).await;
    host.quit().await;

    let late = RecordingModule::new("D", &log);
    assert!(host.manager.load_module(late.definition()).await.unwrap());
    assert!(host.manager.has_module(late.key()));
}
