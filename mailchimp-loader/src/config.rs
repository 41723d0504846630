use std::path::Path;

use mailchimp_config::shared::LoaderConfig;
use mailchimp_config::{load_config, load_config_from};

use crate::error::{LoaderError, LoaderResult};

/// Loads and validates the loader configuration.
///
/// Reads from `config_dir` when given, otherwise from the `configuration` directory under the
/// working directory.
pub fn load_loader_config(config_dir: Option<&Path>) -> LoaderResult<LoaderConfig> {
    let config = match config_dir {
        Some(directory) => load_config_from::<LoaderConfig>(directory),
        None => load_config::<LoaderConfig>(),
    }
    .map_err(LoaderError::config)?;
    config.validate().map_err(LoaderError::config)?;

    Ok(config)
}
