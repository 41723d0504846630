use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of one MailChimp bulk-subscribe write operation.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally leaking the API
/// key, use [`SinkConfigWithoutSecrets`] for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// MailChimp API key, suffixed with its data center (`<key>-us15`).
    pub apikey: SecretString,
    /// Identifier of the list subscribers are added to.
    pub list_id: String,
    /// Whether MailChimp sends an opt-in confirmation email.
    #[serde(default)]
    pub double_optin: bool,
    /// Whether existing subscribers are updated instead of reported as errors.
    #[serde(default)]
    pub update_existing: bool,
    /// Whether submitted interest groups replace the existing ones.
    #[serde(default = "default_true")]
    pub replace_interests: bool,
    #[serde(default = "default_email_column")]
    pub email_column: String,
    #[serde(default = "default_fname_column")]
    pub fname_column: String,
    #[serde(default = "default_lname_column")]
    pub lname_column: String,
    /// Columns holding comma-separated interest group names. The column name is used as the
    /// grouping name.
    #[serde(default)]
    pub grouping_columns: Option<Vec<String>>,
    /// Additional columns sent as merge vars, named after the upper-cased column name.
    #[serde(default)]
    pub merge_fields: Option<Vec<String>>,
    /// Column holding the subscriber's language code.
    #[serde(default)]
    pub language_column: Option<String>,
    /// Maximum number of additional attempts for a delivery failing transiently.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Wait before the first retry, doubled on every following retry.
    #[serde(default = "default_retry_initial_wait_sec")]
    pub retry_initial_wait_sec: u64,
    /// Upper bound of the wait between two attempts.
    #[serde(default = "default_max_retry_wait_sec")]
    pub max_retry_wait_sec: u64,
    /// Whether a record without an email aborts the operation instead of being skipped.
    #[serde(default = "default_true")]
    pub stop_on_invalid_record: bool,
    /// Number of buffered subscribers that forces a bulk-subscribe call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Whether the operation fails when MailChimp rejects any individual email.
    #[serde(default)]
    pub atomic_upsert: bool,
    /// Timeout of a single HTTP request, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Overrides the API base URL otherwise derived from the API key's data center.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl SinkConfig {
    pub const DEFAULT_EMAIL_COLUMN: &'static str = "email";

    pub const DEFAULT_FNAME_COLUMN: &'static str = "fname";

    pub const DEFAULT_LNAME_COLUMN: &'static str = "lname";

    pub const DEFAULT_RETRY_LIMIT: u32 = 5;

    pub const DEFAULT_RETRY_INITIAL_WAIT_SEC: u64 = 1;

    pub const DEFAULT_MAX_RETRY_WAIT_SEC: u64 = 32;

    /// MailChimp accepts up to a million subscribers per bulk-subscribe call.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 1_000_000;

    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    /// Creates a configuration with every optional key at its default.
    pub fn new(apikey: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            apikey: SecretString::from(apikey.into()),
            list_id: list_id.into(),
            double_optin: false,
            update_existing: false,
            replace_interests: true,
            email_column: default_email_column(),
            fname_column: default_fname_column(),
            lname_column: default_lname_column(),
            grouping_columns: None,
            merge_fields: None,
            language_column: None,
            retry_limit: default_retry_limit(),
            retry_initial_wait_sec: default_retry_initial_wait_sec(),
            max_retry_wait_sec: default_max_retry_wait_sec(),
            stop_on_invalid_record: true,
            max_batch_size: default_max_batch_size(),
            atomic_upsert: false,
            timeout_ms: default_timeout_ms(),
            endpoint: None,
        }
    }

    /// Validates values that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.apikey.expose_secret().trim().is_empty() {
            return Err(ValidationError::EmptyField("apikey"));
        }

        if self.list_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("list_id"));
        }

        if self.email_column.is_empty() {
            return Err(ValidationError::EmptyField("email_column"));
        }

        if self.max_batch_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_batch_size",
                constraint: "must be greater than 0",
            });
        }

        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "timeout_ms",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }

    /// Returns the configured grouping columns, empty when none are configured.
    pub fn grouping_columns(&self) -> &[String] {
        self.grouping_columns.as_deref().unwrap_or_default()
    }

    pub fn retry_initial_wait(&self) -> Duration {
        Duration::from_secs(self.retry_initial_wait_sec)
    }

    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_secs(self.max_retry_wait_sec)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// [`SinkConfig`] without the API key, safe to serialize into logs.
#[derive(Debug, Clone, Serialize)]
pub struct SinkConfigWithoutSecrets {
    pub list_id: String,
    pub double_optin: bool,
    pub update_existing: bool,
    pub replace_interests: bool,
    pub email_column: String,
    pub fname_column: String,
    pub lname_column: String,
    pub grouping_columns: Option<Vec<String>>,
    pub merge_fields: Option<Vec<String>>,
    pub language_column: Option<String>,
    pub retry_limit: u32,
    pub retry_initial_wait_sec: u64,
    pub max_retry_wait_sec: u64,
    pub stop_on_invalid_record: bool,
    pub max_batch_size: usize,
    pub atomic_upsert: bool,
    pub timeout_ms: u64,
    pub endpoint: Option<String>,
}

impl From<&SinkConfig> for SinkConfigWithoutSecrets {
    fn from(value: &SinkConfig) -> Self {
        Self {
            list_id: value.list_id.clone(),
            double_optin: value.double_optin,
            update_existing: value.update_existing,
            replace_interests: value.replace_interests,
            email_column: value.email_column.clone(),
            fname_column: value.fname_column.clone(),
            lname_column: value.lname_column.clone(),
            grouping_columns: value.grouping_columns.clone(),
            merge_fields: value.merge_fields.clone(),
            language_column: value.language_column.clone(),
            retry_limit: value.retry_limit,
            retry_initial_wait_sec: value.retry_initial_wait_sec,
            max_retry_wait_sec: value.max_retry_wait_sec,
            stop_on_invalid_record: value.stop_on_invalid_record,
            max_batch_size: value.max_batch_size,
            atomic_upsert: value.atomic_upsert,
            timeout_ms: value.timeout_ms,
            endpoint: value.endpoint.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_email_column() -> String {
    SinkConfig::DEFAULT_EMAIL_COLUMN.to_owned()
}

fn default_fname_column() -> String {
    SinkConfig::DEFAULT_FNAME_COLUMN.to_owned()
}

fn default_lname_column() -> String {
    SinkConfig::DEFAULT_LNAME_COLUMN.to_owned()
}

fn default_retry_limit() -> u32 {
    SinkConfig::DEFAULT_RETRY_LIMIT
}

fn default_retry_initial_wait_sec() -> u64 {
    SinkConfig::DEFAULT_RETRY_INITIAL_WAIT_SEC
}

fn default_max_retry_wait_sec() -> u64 {
    SinkConfig::DEFAULT_MAX_RETRY_WAIT_SEC
}

fn default_max_batch_size() -> usize {
    SinkConfig::DEFAULT_MAX_BATCH_SIZE
}

fn default_timeout_ms() -> u64 {
    SinkConfig::DEFAULT_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_are_applied() {
        let config: SinkConfig =
            serde_json::from_value(json!({"apikey": "abc-us1", "list_id": "list"})).unwrap();

        assert!(!config.double_optin);
        assert!(!config.update_existing);
        assert!(config.replace_interests);
        assert_eq!(config.email_column, "email");
        assert_eq!(config.fname_column, "fname");
        assert_eq!(config.lname_column, "lname");
        assert_eq!(config.grouping_columns, None);
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.retry_initial_wait(), Duration::from_secs(1));
        assert_eq!(config.max_retry_wait(), Duration::from_secs(32));
        assert_eq!(config.merge_fields, None);
        assert_eq!(config.language_column, None);
        assert!(config.stop_on_invalid_record);
        assert_eq!(config.max_batch_size, 1_000_000);
        assert!(!config.atomic_upsert);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_apikey_fails_deserialization() {
        let result = serde_json::from_value::<SinkConfig>(json!({"list_id": "list"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_list_id() {
        let config = SinkConfig::new("abc-us1", " ");
        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyField("list_id"))
        );
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = SinkConfig::new("abc-us1", "list");
        config.max_batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "max_batch_size",
                ..
            })
        ));
    }

    #[test]
    fn test_config_without_secrets_omits_apikey() {
        let mut config = SinkConfig::new("secret-us1", "list");
        config.grouping_columns = Some(vec!["interests".to_owned()]);

        let rendered =
            serde_json::to_string(&SinkConfigWithoutSecrets::from(&config)).unwrap();

        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("interests"));
    }
}
