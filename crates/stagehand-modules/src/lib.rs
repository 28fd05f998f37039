#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Module lifecycle manager for Stagehand hosts.
//!
//! A host builds one [`ModuleManager`] and loads its modules in start order.
//! Each module goes through `created → init → start`; a failing hook rolls
//! the module back (`stop` if `start` was reached, then `destroy`) and it is
//! never registered. Unloading runs `stop` and `destroy` and always removes
//! the module. On the host's quit event the manager unloads everything in
//! reverse load order.
//!
//! # Writing a module
//!
//! ```
//! use std::sync::LazyLock;
//! use stagehand_modules::prelude::*;
//!
//! static NOTES: LazyLock<ModuleKey> = LazyLock::new(|| ModuleKey::new("notes"));
//!
//! struct Notes;
//!
//! #[async_trait]
//! impl Module for Notes {
//!     fn key(&self) -> &ModuleKey {
//!         &NOTES
//!     }
//!
//!     fn file_config(&self) -> Option<ModuleFileConfig> {
//!         Some(ModuleFileConfig::new())
//!     }
//!
//!     async fn init(&self, ctx: &InitContext) -> ModuleResult<()> {
//!         if let Some(dir) = &ctx.storage {
//!             dir.write_file("opened", "1").await?;
//!         }
//!         Ok(())
//!     }
//!
//!     async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
//!         Ok(())
//!     }
//! }
//! ```

pub mod prelude;

mod context;
mod error;
mod host;
mod key;
mod manager;
mod module;
mod registry;
mod storage;

pub use context::{
    BaseContext, ContextBuilder, CreateContext, DestroyContext, InitContext, StartContext,
    StopContext, StopReason,
};
pub use error::{ModuleError, ModuleResult, StorageError, StorageResult};
pub use host::{BasicHostApp, HostApp};
pub use key::ModuleKey;
pub use manager::{ManagerConfig, ModuleManager};
pub use module::{
    AsAnyArc, LifecyclePhase, LoadOptions, Module, ModuleConstructor, ModuleDefinition,
    ModuleHooks, ModuleType,
};
pub use registry::ModuleRegistry;
pub use storage::{ModuleFileConfig, ResolvedFileConfig, StorageDir};
