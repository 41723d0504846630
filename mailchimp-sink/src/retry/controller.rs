use std::future::Future;
use std::time::Duration;

use mailchimp_config::shared::SinkConfig;
use metrics::counter;
use tokio::time::sleep;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, SinkResult};
use crate::metrics::{
    LIST_ID_LABEL, MAILCHIMP_FLUSH_ATTEMPTS_TOTAL, MAILCHIMP_FLUSH_RETRIES_TOTAL,
};
use crate::retry::policy::{RetryDirective, build_retry_policy};
use crate::sink_error;

/// Retries an operation on transient failures with exponential backoff.
///
/// The wait before attempt `n` (from 2) is `initial_wait * 2^(n - 2)`, capped at `max_wait`, so
/// with the defaults a failing delivery is attempted six times over 31 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    retry_limit: u32,
    initial_wait: Duration,
    max_wait: Duration,
}

impl RetryController {
    pub fn new(retry_limit: u32, initial_wait: Duration, max_wait: Duration) -> Self {
        Self {
            retry_limit,
            initial_wait,
            max_wait,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(
            config.retry_limit,
            config.retry_initial_wait(),
            config.max_retry_wait(),
        )
    }

    /// Returns the maximum number of retries after the first attempt.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Returns the wait before the 1-indexed `attempt`, zero for the first one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.initial_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error, or fails
    /// transiently more than `retry_limit` times after the first attempt.
    ///
    /// `operation` receives the 1-indexed attempt number. Exhausting the retries fails with
    /// [`ErrorKind::RetryExhausted`] whose source is the last transient error.
    pub async fn run<T, F, Fut>(
        &self,
        flush_id: Uuid,
        list_id: &str,
        mut operation: F,
    ) -> SinkResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SinkResult<T>>,
    {
        let mut attempt = 1;

        loop {
            counter!(MAILCHIMP_FLUSH_ATTEMPTS_TOTAL, LIST_ID_LABEL => list_id.to_owned())
                .increment(1);

            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if build_retry_policy(&err).retry_directive() == RetryDirective::NoRetry {
                return Err(err);
            }

            if attempt > self.retry_limit {
                error!(
                    %flush_id,
                    list_id,
                    attempts = attempt,
                    error = %err,
                    "MailChimp delivery kept failing, giving up"
                );

                return Err(sink_error!(
                    ErrorKind::RetryExhausted,
                    "MailChimp delivery retries exhausted",
                    format!(
                        "delivery failed {attempt} times, the last failure was: {}",
                        err.description()
                    ),
                    source: err
                ));
            }

            attempt += 1;
            let wait = self.backoff(attempt);

            counter!(MAILCHIMP_FLUSH_RETRIES_TOTAL, LIST_ID_LABEL => list_id.to_owned())
                .increment(1);
            warn!(
                %flush_id,
                list_id,
                attempt,
                retry_limit = self.retry_limit,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "MailChimp delivery failed transiently, backing off before retry"
            );

            sleep(wait).await;
        }
    }
}
