use crate::error::{ErrorClass, ErrorKind, SinkError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// The delivery is retried after a backoff.
    Timed,
    /// The delivery fails immediately.
    NoRetry,
}

/// Policy describing how a [`SinkError`] is handled by the retry controller and reported to
/// operators.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl RetryPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an optional operator-facing solution message.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Builds the [`RetryPolicy`] of an error.
///
/// Only transient errors are retried. Configuration and data errors would fail the same way
/// on every attempt, and exhausted retries already consumed the budget.
pub fn build_retry_policy(error: &SinkError) -> RetryPolicy {
    if error.class() == ErrorClass::Transient {
        return RetryPolicy::new(RetryDirective::Timed, None);
    }

    match error.kind() {
        ErrorKind::MissingSchemaColumn => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Set `email_column` to a column of the input schema."),
        ),
        ErrorKind::AuthenticationError => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Verify the MailChimp API key, including its data center suffix (`-us1`)."),
        ),
        ErrorKind::MissingEmail => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some(
                "Fill in the email of every record, or set `stop_on_invalid_record` to false to skip records without one.",
            ),
        ),
        ErrorKind::PayloadRejected => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Check that the list id, merge fields and interest groupings exist on the list."),
        ),
        ErrorKind::RetryExhausted => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some(
                "MailChimp kept failing transiently. Run the operation again later, or raise `retry_limit` and `retry_initial_wait_sec`.",
            ),
        ),
        ErrorKind::ConfigError => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Review the sink configuration."),
        ),
        _ => RetryPolicy::new(RetryDirective::NoRetry, None),
    }
}
