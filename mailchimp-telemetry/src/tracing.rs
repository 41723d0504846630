use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Filter applied to tests when `RUST_LOG` is not set.
const DEFAULT_TEST_LOG_FILTER: &str = "debug";

static TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for a binary.
///
/// Events are filtered by `RUST_LOG`, defaulting to `info`, and written to stderr so stdout
/// stays free for program output.
pub fn init_tracing(app_name: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()?;

    ::tracing::info!(app_name, "tracing initialized");

    Ok(())
}

/// Installs a subscriber writing through the test harness' captured output.
///
/// Safe to call from every test, only the first call installs the subscriber.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_TEST_LOG_FILTER.into());

        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
