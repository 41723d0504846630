//! MailChimp 2.0 API destination.

mod client;
mod encoding;

pub use client::{MailChimpClient, MailChimpConnector, endpoint_for_api_key, mask_email};
