use serde::Deserialize;

use crate::load::Config;
use crate::shared::{SinkConfig, ValidationError};

/// Configuration of the loader binary.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    pub sink: SinkConfig,
    pub input: InputConfig,
    /// Buffers and logs subscribers instead of calling MailChimp.
    #[serde(default)]
    pub dry_run: bool,
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sink.validate()?;
        self.input.validate()
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "sink.grouping_columns",
        "sink.merge_fields",
        "input.columns",
    ];
}

/// Shape of the rows the loader reads.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Column names, in the order positional rows carry their values.
    pub columns: Vec<String>,
    /// Number of rows handed to the sink per `add` call.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl InputConfig {
    pub const DEFAULT_PAGE_SIZE: usize = 1_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.columns.is_empty() {
            return Err(ValidationError::EmptyField("input.columns"));
        }

        if self.page_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "input.page_size",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

fn default_page_size() -> usize {
    InputConfig::DEFAULT_PAGE_SIZE
}
