//! Batched MailChimp bulk-subscribe sink.
//!
//! Rows from an upstream pipeline are mapped to subscribers by [`mapper::RecordMapper`],
//! buffered per partition by [`sink::MailChimpSink`] and delivered in bulk through a
//! [`destination::SubscriberDestination`], retrying transient failures with exponential
//! backoff. [`pipeline::Transaction`] validates a write operation once before any partition
//! starts writing.

pub mod buffer;
pub mod destination;
pub mod error;
mod macros;
pub mod mapper;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
