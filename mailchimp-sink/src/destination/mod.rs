//! Destinations receiving batches of subscribers.
//!
//! [`SubscriberDestination`] is the seam between the sink and the remote service.
//! [`mailchimp::MailChimpClient`] talks to the MailChimp API and [`memory::MemoryDestination`]
//! keeps batches in memory for dry runs.

mod base;
pub mod mailchimp;
pub mod memory;

pub use base::{
    BulkSubscribeReport, BulkSubscribeRequest, DestinationConnector, SubscriberDestination,
    SubscriberError,
};
