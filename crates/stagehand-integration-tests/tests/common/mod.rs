//! Shared helpers for integration tests.

use stagehand_config::ConfigReader;
use stagehand_modules::ModuleKey;
use stagehand_test::{RecordingModule, TestHost};

/// Load every module in order, returning each `load_module` result.
#[allow(dead_code)]
pub async fn load_all(host: &TestHost, modules: &[RecordingModule]) -> Vec<bool> {
    let mut results = Vec::with_capacity(modules.len());
    for module in modules {
        results.push(host.manager.load_module(module.definition()).await.unwrap());
    }
    results
}

/// Keys of `modules`, in order.
#[allow(dead_code)]
pub fn keys(modules: &[RecordingModule]) -> Vec<ModuleKey> {
    modules.iter().map(|m| m.key().clone()).collect()
}

/// A reader over an inline TOML document.
#[allow(dead_code)]
pub fn reader(doc: &str) -> ConfigReader {
    ConfigReader::new(toml::from_str(doc).unwrap())
}
