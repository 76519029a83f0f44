//! Structured test logging.
//!
//! ```ignore
//! #[ctor::ctor]
//! fn setup() {
//!     cwait_common::testing::init_test_logging();
//! }
//! ```

use std::sync::Once;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a JSON subscriber on the test writer.
///
/// Safe to call from every test; only the first call installs anything.
/// `CWAIT_TEST_LOG_LEVEL` overrides the default `debug` filter.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let level = std::env::var("CWAIT_TEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("debug"));

        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_thread_ids(true)
                    .json(),
            )
            .with(filter)
            .try_init();
    });
}
