//! Process-wide logging setup for tally binaries and tests.

/// Initialize tracing with the format named by `TALLY_LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init_with};
