//! Lifecycle of a write operation.
//!
//! A write operation is validated once by [`Transaction::begin`], which builds the immutable
//! [`Task`] shared by every partition and checks the credentials before any row is read. Each
//! partition then writes through its own [`MailChimpSink`] opened with [`Transaction::open`].

use std::sync::Arc;

use mailchimp_config::shared::{SinkConfig, SinkConfigWithoutSecrets};
use tracing::{error, info};

use crate::destination::{DestinationConnector, SubscriberDestination};
use crate::error::SinkResult;
use crate::mapper::RecordMapper;
use crate::sink::MailChimpSink;
use crate::types::{Row, Schema};

/// What happens to a row without an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRecordPolicy {
    /// Fail the operation.
    Stop,
    /// Drop the row and continue.
    Skip,
}

/// Configuration and schema of a write operation, resolved once and shared by its partitions.
#[derive(Debug)]
pub struct Task {
    config: SinkConfig,
    schema: Schema,
    mapper: RecordMapper,
}

impl Task {
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mapper(&self) -> &RecordMapper {
        &self.mapper
    }

    pub fn invalid_record_policy(&self) -> InvalidRecordPolicy {
        if self.config.stop_on_invalid_record {
            InvalidRecordPolicy::Stop
        } else {
            InvalidRecordPolicy::Skip
        }
    }
}

/// Acknowledgment of a committed partition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskReport {}

/// Configuration changes produced by a committed write operation.
///
/// Nothing is carried over between runs, so the diff is always empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigDiff {}

/// Validates `config` and resolves its columns against `schema`.
///
/// Fails with a configuration error when a value is invalid or the email column is not part
/// of the schema. No remote call is made.
pub fn validate_and_build_task(config: SinkConfig, schema: Schema) -> SinkResult<Task> {
    config.validate()?;
    let mapper = RecordMapper::new(&config, &schema)?;

    Ok(Task {
        config,
        schema,
        mapper,
    })
}

/// A validated write operation.
#[derive(Debug)]
pub struct Transaction<C> {
    task: Arc<Task>,
    connector: C,
}

impl<C> Transaction<C>
where
    C: DestinationConnector,
{
    /// Validates the operation before any row is processed.
    ///
    /// Builds the [`Task`] and connects a destination once so that rejected credentials fail
    /// the operation up front.
    pub async fn begin(config: SinkConfig, schema: Schema, connector: C) -> SinkResult<Self> {
        let task = validate_and_build_task(config, schema)?;
        connector.connect(task.config()).await?;

        info!(
            destination = <C::Destination as SubscriberDestination>::name(),
            config = ?SinkConfigWithoutSecrets::from(task.config()),
            columns = ?task.schema().columns(),
            "write operation validated"
        );

        Ok(Self {
            task: Arc::new(task),
            connector,
        })
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Opens the sink of one partition with a destination of its own.
    pub async fn open(&self) -> SinkResult<MailChimpSink<C::Destination>> {
        let destination = self.connector.connect(self.task.config()).await?;

        Ok(MailChimpSink::new(self.task.clone(), destination))
    }

    /// Writes one partition: opens a sink, adds every page, finishes and commits it.
    ///
    /// On failure the sink is aborted and the error returned.
    pub async fn run_partition<I>(&self, pages: I) -> SinkResult<TaskReport>
    where
        I: IntoIterator<Item = Vec<Row>>,
    {
        let mut sink = self.open().await?;

        match write_pages(&mut sink, pages).await {
            Ok(()) => Ok(sink.commit()),
            Err(err) => {
                error!(error = %err, "partition failed, aborting");
                sink.abort();

                Err(err)
            }
        }
    }

    /// Completes the operation once every partition committed.
    pub fn commit(self, reports: &[TaskReport]) -> ConfigDiff {
        info!(
            list_id = %self.task.config().list_id,
            partitions = reports.len(),
            "write operation committed"
        );

        ConfigDiff::default()
    }
}

async fn write_pages<D, I>(sink: &mut MailChimpSink<D>, pages: I) -> SinkResult<()>
where
    D: SubscriberDestination + Sync,
    I: IntoIterator<Item = Vec<Row>>,
{
    for page in pages {
        sink.add(&page).await?;
    }

    sink.finish().await
}
