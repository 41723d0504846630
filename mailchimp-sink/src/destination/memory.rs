use std::sync::Arc;

use mailchimp_config::shared::SinkConfig;
use tokio::sync::Mutex;
use tracing::info;

use crate::destination::{
    BulkSubscribeReport, BulkSubscribeRequest, DestinationConnector, SubscriberDestination,
};
use crate::error::SinkResult;
use crate::types::SubscriberEntry;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<SubscriberEntry>>,
}

/// In-memory destination for dry runs and tests.
///
/// Every bulk-subscribe call is accepted and stored as one batch, and every subscriber is
/// reported as created. Clones share the stored batches.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every batch received, in call order.
    pub async fn batches(&self) -> Vec<Vec<SubscriberEntry>> {
        let inner = self.inner.lock().await;
        inner.batches.clone()
    }

    /// Returns every subscriber received, flattened across batches.
    pub async fn subscribers(&self) -> Vec<SubscriberEntry> {
        let inner = self.inner.lock().await;
        inner.batches.iter().flatten().cloned().collect()
    }

    /// Drops every stored batch.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.batches.clear();
    }
}

impl SubscriberDestination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn bulk_subscribe(
        &self,
        request: BulkSubscribeRequest<'_>,
    ) -> SinkResult<BulkSubscribeReport> {
        let mut inner = self.inner.lock().await;

        info!(
            list_id = request.list_id,
            batch_size = request.entries.len(),
            "storing subscriber batch in memory"
        );
        inner.batches.push(request.entries.to_vec());

        Ok(BulkSubscribeReport {
            add_count: request.entries.len() as u64,
            ..BulkSubscribeReport::default()
        })
    }
}

/// Connecting a [`MemoryDestination`] hands out a clone sharing its batches.
impl DestinationConnector for MemoryDestination {
    type Destination = MemoryDestination;

    async fn connect(&self, config: &SinkConfig) -> SinkResult<MemoryDestination> {
        info!(list_id = %config.list_id, "using in-memory destination");

        Ok(self.clone())
    }
}
