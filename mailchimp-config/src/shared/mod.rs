//! Configuration types shared by the sink library and the loader binary.

mod base;
mod loader;
mod sink;

pub use base::ValidationError;
pub use loader::{InputConfig, LoaderConfig};
pub use sink::{SinkConfig, SinkConfigWithoutSecrets};
