use std::future::Future;

use mailchimp_config::shared::SinkConfig;

use crate::error::SinkResult;
use crate::types::SubscriberEntry;

/// One bulk-subscribe call against a list.
#[derive(Debug, Clone, Copy)]
pub struct BulkSubscribeRequest<'a> {
    pub list_id: &'a str,
    pub entries: &'a [SubscriberEntry],
    pub double_optin: bool,
    pub update_existing: bool,
    pub replace_interests: bool,
}

/// A subscriber rejected individually within an otherwise successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberError {
    pub email: String,
    pub code: i64,
    pub message: String,
}

/// Outcome of a successful bulk-subscribe call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSubscribeReport {
    pub add_count: u64,
    pub update_count: u64,
    pub error_count: u64,
    pub errors: Vec<SubscriberError>,
}

/// Trait for services that accept batches of subscribers.
///
/// Implementations classify their failures through [`crate::error::ErrorKind`]: transient
/// kinds are retried by the caller, every other kind aborts the write operation. A call must
/// be safe to repeat with the same batch, since a retried batch may already be partially
/// applied remotely.
pub trait SubscriberDestination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Adds or updates `request.entries` on the list.
    ///
    /// Subscribers rejected individually are reported in [`BulkSubscribeReport::errors`] and
    /// do not fail the call.
    fn bulk_subscribe(
        &self,
        request: BulkSubscribeRequest<'_>,
    ) -> impl Future<Output = SinkResult<BulkSubscribeReport>> + Send;
}

/// Builds connected destinations for a write operation.
///
/// A write operation connects once up front to validate credentials, then once per partition,
/// so partitions never share a destination.
pub trait DestinationConnector {
    type Destination: SubscriberDestination + Send + Sync;

    /// Connects a destination, failing with a configuration error when the remote service
    /// rejects the configured credentials.
    fn connect(
        &self,
        config: &SinkConfig,
    ) -> impl Future<Output = SinkResult<Self::Destination>> + Send;
}
