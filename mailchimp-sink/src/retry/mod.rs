//! Bounded retry of deliveries failing transiently.

mod controller;
pub mod policy;

pub use controller::RetryController;
pub use policy::{RetryDirective, RetryPolicy, build_retry_policy};
