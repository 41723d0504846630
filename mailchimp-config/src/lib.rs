//! Configuration types and loading for the MailChimp sink.
//!
//! [`shared`] holds the typed configuration consumed by the sink and the loader binary, and
//! [`load_config`] resolves those types from configuration files and environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::{Environment, UnknownEnvironment};
pub use load::{Config, LoadConfigError, load_config, load_config_from};
