//! Metrics definitions for subscriber delivery.

/// Label for the target list in metrics.
pub const LIST_ID_LABEL: &str = "list_id";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for bulk-subscribe calls, including retries.
pub const MAILCHIMP_FLUSH_ATTEMPTS_TOTAL: &str = "mailchimp_flush_attempts_total";

/// Counter for retries scheduled after a transient failure.
pub const MAILCHIMP_FLUSH_RETRIES_TOTAL: &str = "mailchimp_flush_retries_total";

/// Counter for flushes that failed permanently, labelled by error kind.
pub const MAILCHIMP_FLUSH_FAILURES_TOTAL: &str = "mailchimp_flush_failures_total";

/// Histogram of the number of subscribers per flushed batch.
pub const MAILCHIMP_FLUSH_BATCH_SIZE: &str = "mailchimp_flush_batch_size";

/// Histogram of the wall-clock duration of a flush, retries included, in seconds.
pub const MAILCHIMP_FLUSH_DURATION_SECONDS: &str = "mailchimp_flush_duration_seconds";

/// Counter for subscribers rejected individually by MailChimp.
pub const MAILCHIMP_SUBSCRIBER_ERRORS_TOTAL: &str = "mailchimp_subscriber_errors_total";

/// Counter for rows skipped because they carry no email.
pub const MAILCHIMP_ROWS_SKIPPED_TOTAL: &str = "mailchimp_rows_skipped_total";
