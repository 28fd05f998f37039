//! Commonly used test helpers.

pub use crate::fixtures::{TEST_QUIT_EVENT, TestHost, init_test_logging, test_host_app, test_manager};
pub use crate::mocks::{CallLog, CallRecord, RecordingModule};
