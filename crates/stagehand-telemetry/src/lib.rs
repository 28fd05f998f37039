#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Logging setup for Stagehand hosts.
//!
//! Wraps `tracing-subscriber` with a small serializable [`LogConfig`]. With
//! the `config` feature a [`LogConfig`] can be built straight from the host
//! configuration's `[logging]` section.
//!
//! ```rust,no_run
//! use stagehand_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("stagehand_modules=trace");
//! setup_logging(&config).unwrap();
//! ```

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
