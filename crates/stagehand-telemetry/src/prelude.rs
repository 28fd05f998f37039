//! Commonly used telemetry types.

pub use crate::error::{TelemetryError, TelemetryResult};
pub use crate::logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
