//! Common types used throughout the sink.
//!
//! Rows arrive as positional [`Value`]s described by a [`Schema`], and leave as
//! [`SubscriberEntry`] values shaped after MailChimp's subscriber model.

mod row;
mod schema;
mod subscriber;
mod value;

pub use row::*;
pub use schema::*;
pub use subscriber::*;
pub use value::*;
