use std::path::Path;

use mailchimp_config::shared::LoaderConfig;
use mailchimp_sink::destination::{DestinationConnector, SubscriberDestination};
use mailchimp_sink::destination::mailchimp::MailChimpConnector;
use mailchimp_sink::destination::memory::MemoryDestination;
use mailchimp_sink::pipeline::Transaction;
use mailchimp_sink::sink::MailChimpSink;
use mailchimp_sink::types::Schema;
use tokio::io::AsyncBufRead;
use tracing::{error, info};

use crate::error::LoaderResult;
use crate::input::RowReader;

/// Loads every row of `input` (stdin when absent) into the configured list.
pub async fn start_loader_with_config(
    config: LoaderConfig,
    input: Option<&Path>,
) -> LoaderResult<()> {
    let schema = Schema::new(config.input.columns.iter().cloned());
    let page_size = config.input.page_size;
    let reader = RowReader::open(input, schema.clone()).await?;

    if config.dry_run {
        info!("dry run, subscribers are kept in memory");

        let destination = MemoryDestination::new();
        load(config, schema, destination.clone(), reader, page_size).await?;

        info!(
            subscribers = destination.subscribers().await.len(),
            batches = destination.batches().await.len(),
            "dry run completed"
        );

        return Ok(());
    }

    load(config, schema, MailChimpConnector, reader, page_size).await
}

/// Runs one write operation with a single partition fed by `reader`.
async fn load<C, R>(
    config: LoaderConfig,
    schema: Schema,
    connector: C,
    mut reader: RowReader<R>,
    page_size: usize,
) -> LoaderResult<()>
where
    C: DestinationConnector,
    R: AsyncBufRead + Unpin,
{
    let transaction = Transaction::begin(config.sink, schema, connector).await?;
    let mut sink = transaction.open().await?;

    match write_rows(&mut sink, &mut reader, page_size).await {
        Ok(()) => {
            let stats = *sink.stats();
            let report = sink.commit();
            transaction.commit(&[report]);

            info!(
                rows = stats.rows_seen,
                skipped = stats.rows_skipped,
                created = stats.created,
                updated = stats.updated,
                rejected = stats.rejected,
                "load completed"
            );

            Ok(())
        }
        Err(err) => {
            error!(error = %err, "load failed, aborting");
            sink.abort();

            Err(err)
        }
    }
}

async fn write_rows<D, R>(
    sink: &mut MailChimpSink<D>,
    reader: &mut RowReader<R>,
    page_size: usize,
) -> LoaderResult<()>
where
    D: SubscriberDestination + Sync,
    R: AsyncBufRead + Unpin,
{
    loop {
        let page = reader.next_page(page_size).await?;
        if page.is_empty() {
            break;
        }

        sink.add(&page).await?;
    }

    sink.finish().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use mailchimp_config::shared::InputConfig;
    use mailchimp_sink::error::ErrorKind;
    use mailchimp_sink::test_utils::test_config;

    use super::*;
    use crate::error::LoaderError;

    fn loader_config() -> LoaderConfig {
        LoaderConfig {
            sink: test_config(),
            input: InputConfig {
                columns: vec!["email".to_owned(), "fname".to_owned()],
                page_size: 2,
            },
            dry_run: true,
        }
    }

    #[tokio::test]
    async fn test_loads_every_row_in_order() {
        let config = loader_config();
        let schema = Schema::new(config.input.columns.iter().cloned());
        let input = b"[\"a@example.com\", \"Ann\"]\n{\"email\": \"b@example.com\"}\n[\"c@example.com\"]\n";
        let destination = MemoryDestination::new();

        load(
            config,
            schema.clone(),
            destination.clone(),
            RowReader::new(&input[..], schema),
            2,
        )
        .await
        .unwrap();

        let emails: Vec<_> = destination
            .subscribers()
            .await
            .into_iter()
            .map(|entry| entry.email)
            .collect();
        assert_eq!(emails, ["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn test_malformed_input_aborts_the_load() {
        let mut config = loader_config();
        config.sink.max_batch_size = 2;
        let schema = Schema::new(config.input.columns.iter().cloned());
        let input = b"[\"a@example.com\"]\n[\"b@example.com\"]\n{broken\n";
        let destination = MemoryDestination::new();

        let err = load(
            config,
            schema.clone(),
            destination.clone(),
            RowReader::new(&input[..], schema),
            2,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            &err,
            LoaderError::Sink(sink_error) if sink_error.kind() == ErrorKind::InvalidData
        ));
        // The first page was delivered before the broken line was read.
        assert_eq!(destination.batches().await.len(), 1);
    }
}
