//! Helpers for testing sinks without a MailChimp account.

mod destination;

pub use destination::ScriptedDestination;

use mailchimp_config::shared::SinkConfig;

use crate::types::{Row, Value};

/// Returns a configuration with default values that retries without waiting.
pub fn test_config() -> SinkConfig {
    let mut config = SinkConfig::new("0123456789abcdef-us1", "test-list");
    config.retry_initial_wait_sec = 0;
    config
}

/// Builds a row from values convertible into [`Value`].
pub fn row<I, V>(values: I) -> Row
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}
