//! Tracing setup and event observers for sweep runs.

/// Initialize process-wide tracing output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber installation (filters, output format).
pub mod tracing;

/// Observers turning sweep events into log output or test fixtures.
pub mod observer;

pub use observer::{RecordingObserver, TracingObserver};
pub use crate::tracing::LogFormat;
