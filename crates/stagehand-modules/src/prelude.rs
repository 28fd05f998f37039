//! Everything a module implementation usually needs.
//!
//! ```
//! use stagehand_modules::prelude::*;
//! ```

pub use crate::context::{
    BaseContext, CreateContext, DestroyContext, InitContext, StartContext, StopContext, StopReason,
};
pub use crate::error::{ModuleError, ModuleResult, StorageError, StorageResult};
pub use crate::host::HostApp;
pub use crate::key::ModuleKey;
pub use crate::manager::ModuleManager;
pub use crate::module::{LifecyclePhase, Module, ModuleDefinition, ModuleHooks, ModuleType};
pub use crate::storage::{ModuleFileConfig, StorageDir};

pub use async_trait::async_trait;
