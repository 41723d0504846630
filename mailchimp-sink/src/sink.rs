//! Per-partition orchestration of mapping, buffering and delivery.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bail;
use crate::buffer::BatchBuffer;
use crate::destination::{BulkSubscribeRequest, SubscriberDestination};
use crate::error::{ErrorKind, SinkResult};
use crate::metrics::{
    ERROR_KIND_LABEL, LIST_ID_LABEL, MAILCHIMP_FLUSH_BATCH_SIZE, MAILCHIMP_FLUSH_DURATION_SECONDS,
    MAILCHIMP_FLUSH_FAILURES_TOTAL, MAILCHIMP_ROWS_SKIPPED_TOTAL,
    MAILCHIMP_SUBSCRIBER_ERRORS_TOTAL,
};
use crate::pipeline::{InvalidRecordPolicy, Task, TaskReport};
use crate::retry::RetryController;
use crate::types::{Row, SubscriberEntry};

/// Counters of one sink, logged when it finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkStats {
    pub rows_seen: u64,
    pub rows_skipped: u64,
    /// Subscribers handed to the destination by successful flushes.
    pub pushed: u64,
    pub created: u64,
    pub updated: u64,
    /// Subscribers the destination rejected individually.
    pub rejected: u64,
    pub flushes: u64,
}

/// Write side of one partition.
///
/// The sink owns its buffer and destination for the lifetime of the partition. Rows are mapped
/// and buffered by [`MailChimpSink::add`], and the buffer is delivered whenever it fills up and
/// once more by [`MailChimpSink::finish`]. A sink ends with either [`MailChimpSink::commit`] or
/// [`MailChimpSink::abort`].
#[derive(Debug)]
pub struct MailChimpSink<D> {
    task: Arc<Task>,
    destination: D,
    buffer: BatchBuffer,
    retry: RetryController,
    stats: SinkStats,
}

impl<D> MailChimpSink<D>
where
    D: SubscriberDestination + Sync,
{
    pub fn new(task: Arc<Task>, destination: D) -> Self {
        let buffer = BatchBuffer::new(task.config().max_batch_size);
        let retry = RetryController::from_config(task.config());

        Self {
            task,
            destination,
            buffer,
            retry,
            stats: SinkStats::default(),
        }
    }

    /// Maps and buffers a page of rows, flushing every time the buffer fills up.
    ///
    /// A row without an email fails the call with [`ErrorKind::MissingEmail`] unless the task
    /// skips invalid records. Rows of the page before the failing one stay buffered.
    pub async fn add(&mut self, page: &[Row]) -> SinkResult<()> {
        for row in page {
            self.stats.rows_seen += 1;

            let Some(entry) = self.task.mapper().map(row) else {
                self.reject_row()?;
                continue;
            };

            self.buffer.append(entry);
            if self.buffer.is_full() {
                self.flush().await?;
            }
        }

        Ok(())
    }

    /// Delivers the buffered subscribers, retrying transient failures.
    ///
    /// The buffer is empty afterwards whether or not the delivery succeeded. Flushing an empty
    /// buffer does not call the destination.
    pub async fn flush(&mut self) -> SinkResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let entries = self.buffer.drain();
        let config = self.task.config();
        let flush_id = Uuid::new_v4();
        let request = BulkSubscribeRequest {
            list_id: &config.list_id,
            entries: &entries,
            double_optin: config.double_optin,
            update_existing: config.update_existing,
            replace_interests: config.replace_interests,
        };

        info!(
            %flush_id,
            list_id = %config.list_id,
            batch_size = entries.len(),
            destination = D::name(),
            "flushing subscribers"
        );
        histogram!(MAILCHIMP_FLUSH_BATCH_SIZE, LIST_ID_LABEL => config.list_id.clone())
            .record(entries.len() as f64);

        let started = Instant::now();
        let destination = &self.destination;
        let result = self
            .retry
            .run(flush_id, &config.list_id, move |_| {
                destination.bulk_subscribe(request)
            })
            .await;
        histogram!(MAILCHIMP_FLUSH_DURATION_SECONDS, LIST_ID_LABEL => config.list_id.clone())
            .record(started.elapsed().as_secs_f64());

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                counter!(
                    MAILCHIMP_FLUSH_FAILURES_TOTAL,
                    LIST_ID_LABEL => config.list_id.clone(),
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);
                error!(
                    %flush_id,
                    list_id = %config.list_id,
                    batch_size = entries.len(),
                    error = %err,
                    "flush failed"
                );

                return Err(err);
            }
        };

        if report.error_count > 0 {
            counter!(MAILCHIMP_SUBSCRIBER_ERRORS_TOTAL, LIST_ID_LABEL => config.list_id.clone())
                .increment(report.error_count);
        }

        self.stats.flushes += 1;
        self.stats.pushed += entries.len() as u64;
        self.stats.created += report.add_count;
        self.stats.updated += report.update_count;
        self.stats.rejected += report.error_count;

        Ok(())
    }

    /// Delivers the remaining buffered subscribers at the end of the partition.
    ///
    /// With `atomic_upsert` enabled, fails when any subscriber was rejected during the
    /// partition.
    pub async fn finish(&mut self) -> SinkResult<()> {
        self.flush().await?;

        let stats = self.stats;
        info!(
            list_id = %self.task.config().list_id,
            rows = stats.rows_seen,
            skipped = stats.rows_skipped,
            pushed = stats.pushed,
            created = stats.created,
            updated = stats.updated,
            rejected = stats.rejected,
            flushes = stats.flushes,
            "finished writing subscribers"
        );

        if self.task.config().atomic_upsert && stats.rejected > 0 {
            bail!(
                ErrorKind::PayloadRejected,
                "MailChimp rejected subscribers while atomic upsert is enabled",
                format!("{} of {} subscribers were rejected", stats.rejected, stats.pushed)
            );
        }

        Ok(())
    }

    /// Ends the partition without delivering, discarding buffered subscribers.
    pub fn abort(mut self) {
        let discarded = self.buffer.drain().len();
        if discarded > 0 {
            warn!(
                list_id = %self.task.config().list_id,
                discarded,
                "aborting, buffered subscribers are not delivered"
            );
        } else {
            debug!(list_id = %self.task.config().list_id, "aborting");
        }
    }

    /// Ends the partition after a successful [`MailChimpSink::finish`].
    pub fn commit(self) -> TaskReport {
        TaskReport::default()
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    /// Returns the subscribers buffered and not yet delivered.
    pub fn buffered(&self) -> &[SubscriberEntry] {
        self.buffer.entries()
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Applies the invalid-record policy to a row without an email.
    fn reject_row(&mut self) -> SinkResult<()> {
        let email_column = &self.task.config().email_column;

        match self.task.invalid_record_policy() {
            InvalidRecordPolicy::Stop => bail!(
                ErrorKind::MissingEmail,
                "Record has no email",
                format!(
                    "row {} has no value in column '{email_column}'",
                    self.stats.rows_seen
                )
            ),
            InvalidRecordPolicy::Skip => {
                self.stats.rows_skipped += 1;
                counter!(
                    MAILCHIMP_ROWS_SKIPPED_TOTAL,
                    LIST_ID_LABEL => self.task.config().list_id.clone()
                )
                .increment(1);
                debug!(
                    row = self.stats.rows_seen,
                    email_column = %email_column,
                    "skipping record without email"
                );

                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mailchimp_config::shared::SinkConfig;

    use super::*;
    use crate::error::ErrorClass;
    use crate::pipeline::validate_and_build_task;
    use crate::test_utils::{ScriptedDestination, test_config};
    use crate::types::{Schema, Value};

    fn sink(config: SinkConfig) -> MailChimpSink<ScriptedDestination> {
        let schema = Schema::new(["email", "fname", "lname"]);
        let task = validate_and_build_task(config, schema).unwrap();
        MailChimpSink::new(Arc::new(task), ScriptedDestination::new())
    }

    fn row(email: &str) -> Row {
        Row::new(vec![email.into(), "Ann".into(), "Lee".into()])
    }

    #[tokio::test]
    async fn test_add_buffers_one_entry_per_valid_row_in_order() {
        let mut sink = sink(test_config());

        sink.add(&[row("a@example.com"), row("b@example.com")])
            .await
            .unwrap();

        let emails: Vec<_> = sink.buffered().iter().map(|e| e.email.as_str()).collect();
        assert_eq!(emails, ["a@example.com", "b@example.com"]);
        assert_eq!(sink.destination().calls().await, 0);
    }

    #[tokio::test]
    async fn test_missing_email_is_skipped_when_continuing() {
        let mut config = test_config();
        config.stop_on_invalid_record = false;
        let mut sink = sink(config);

        sink.add(&[Row::new(vec![Value::Null, "Ann".into()]), Row::default()])
            .await
            .unwrap();

        assert!(sink.buffered().is_empty());
        assert_eq!(sink.stats().rows_skipped, 2);
    }

    #[tokio::test]
    async fn test_missing_email_stops_by_default() {
        let mut sink = sink(test_config());

        let err = sink
            .add(&[
                row("a@example.com"),
                Row::new(vec!["".into()]),
                row("c@example.com"),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingEmail);
        assert_eq!(err.class(), ErrorClass::Data);
        assert_eq!(sink.buffered().len(), 1);
    }

    #[tokio::test]
    async fn test_full_buffer_is_flushed_before_the_next_row() {
        let mut config = test_config();
        config.max_batch_size = 2;
        let mut sink = sink(config);

        sink.add(&[row("a@example.com"), row("b@example.com"), row("c@example.com")])
            .await
            .unwrap();

        let batches = sink.destination().batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(sink.buffered().len(), 1);
        assert_eq!(sink.buffered()[0].email, "c@example.com");
    }

    #[tokio::test]
    async fn test_failed_flush_empties_the_buffer() {
        let mut sink = sink(test_config());
        sink.destination()
            .fail_next(ErrorKind::PayloadRejected)
            .await;

        sink.add(&[row("a@example.com")]).await.unwrap();
        let err = sink.flush().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PayloadRejected);
        assert!(sink.buffered().is_empty());
        assert_eq!(sink.destination().calls().await, 1);
    }

    #[tokio::test]
    async fn test_finish_on_empty_buffer_does_not_call_destination() {
        let mut sink = sink(test_config());

        sink.finish().await.unwrap();

        assert_eq!(sink.destination().calls().await, 0);
        assert_eq!(sink.commit(), TaskReport::default());
    }

    #[tokio::test]
    async fn test_finish_flushes_remaining_entries_once() {
        let mut sink = sink(test_config());
        sink.add(&[row("a@example.com")]).await.unwrap();

        sink.finish().await.unwrap();

        assert_eq!(sink.destination().calls().await, 1);
        assert_eq!(sink.stats().pushed, 1);
        assert!(sink.buffered().is_empty());
    }

    #[tokio::test]
    async fn test_atomic_upsert_fails_on_rejected_subscribers() {
        let mut config = test_config();
        config.atomic_upsert = true;
        let mut sink = sink(config);
        sink.destination().reject_emails(["b@example.com"]).await;

        sink.add(&[row("a@example.com"), row("b@example.com")])
            .await
            .unwrap();
        let err = sink.finish().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PayloadRejected);
        assert_eq!(sink.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_rejected_subscribers_do_not_fail_without_atomic_upsert() {
        let mut sink = sink(test_config());
        sink.destination().reject_emails(["b@example.com"]).await;

        sink.add(&[row("a@example.com"), row("b@example.com")])
            .await
            .unwrap();
        sink.finish().await.unwrap();

        assert_eq!(sink.stats().created, 1);
        assert_eq!(sink.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_abort_discards_buffered_entries() {
        let mut sink = sink(test_config());
        sink.add(&[row("a@example.com")]).await.unwrap();
        let destination = sink.destination().clone();

        sink.abort();

        assert_eq!(destination.calls().await, 0);
    }
}
