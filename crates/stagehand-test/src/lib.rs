//! Stagehand Test - shared test utilities.
//!
//! Mock modules that record every lifecycle call, and fixtures that build a
//! manager rooted in a temporary directory.
//!
//! ```toml
//! [dev-dependencies]
//! stagehand-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use stagehand_modules::{LifecyclePhase, ModuleDefinition};
//! use stagehand_test::{CallLog, RecordingModule, TestHost};
//!
//! #[tokio::test]
//! async fn rollback_after_init() {
//!     let host = TestHost::new();
//!     let log = CallLog::new();
//!     let module = RecordingModule::new("x", &log).failing_at(LifecyclePhase::Init, "boom");
//!
//!     assert!(!host.manager.load_module(module.definition()).await.unwrap());
//!     assert_eq!(log.hooks_for("x"), ["created", "init", "destroy"]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
