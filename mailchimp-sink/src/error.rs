//! Error types and result definitions for sink operations.
//!
//! Every failure is a [`SinkError`] carrying a closed [`ErrorKind`]. Kinds are grouped into an
//! [`ErrorClass`] which decides how the failure is handled: configuration and data errors abort
//! the operation immediately, transient errors are retried, and exhausted retries are fatal.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for sink operations using [`SinkError`] as the error type.
pub type SinkResult<T> = Result<T, SinkError>;

/// Payload of a [`SinkError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sink operations.
///
/// A [`SinkError`] pairs a static description with optional dynamic detail, an optional
/// originating error and the location it was created at. Equality only compares kinds.
#[derive(Debug, Clone)]
pub struct SinkError {
    payload: Box<ErrorPayload>,
}

/// Specific categories of errors that can occur while delivering subscribers.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    MissingSchemaColumn,
    AuthenticationError,

    // Data Errors
    MissingEmail,
    InvalidData,
    PayloadRejected,
    SerializationError,
    DeserializationError,

    // Transient Destination Errors
    DestinationUnavailable,
    DestinationThrottled,
    DestinationConnectionFailed,

    // Retry Errors
    RetryExhausted,
}

/// Handling class of an [`ErrorKind`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorClass {
    /// Invalid configuration or credentials, detected before or during the operation.
    Configuration,
    /// A record or payload the destination cannot accept.
    Data,
    /// A failure expected to recover on its own, eligible for retry.
    Transient,
    /// Transient failures persisted past the retry budget.
    RetryExhausted,
}

impl ErrorKind {
    /// Returns the handling class of this kind.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::ConfigError
            | ErrorKind::MissingSchemaColumn
            | ErrorKind::AuthenticationError => ErrorClass::Configuration,
            ErrorKind::MissingEmail
            | ErrorKind::InvalidData
            | ErrorKind::PayloadRejected
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError => ErrorClass::Data,
            ErrorKind::DestinationUnavailable
            | ErrorKind::DestinationThrottled
            | ErrorKind::DestinationConnectionFailed => ErrorClass::Transient,
            ErrorKind::RetryExhausted => ErrorClass::RetryExhausted,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorClass::Configuration => "configuration error",
            ErrorClass::Data => "data error",
            ErrorClass::Transient => "transient error",
            ErrorClass::RetryExhausted => "retry exhausted error",
        };

        f.write_str(label)
    }
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the [`ErrorClass`] of this error's kind.
    pub fn class(&self) -> ErrorClass {
        self.payload.kind.class()
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.payload.backtrace
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "{} [{:?}] {} @ {}:{}:{}",
            payload.kind.class(),
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = payload.detail.as_deref() {
            write_detail(detail, f)?;
        }

        Ok(())
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes the detail block indented below the headline.
fn write_detail(detail: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if detail.trim().is_empty() {
        return write!(f, "\n  Detail: <empty>");
    }

    write!(f, "\n  Detail:")?;
    for line in detail.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

/// Creates a [`SinkError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SinkError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`serde_json::Error`] to [`SinkError`] with the appropriate error kind.
///
/// Maps to [`ErrorKind::SerializationError`] for I/O failures while writing and
/// [`ErrorKind::DeserializationError`] for malformed or unexpected input.
impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => {
                (ErrorKind::SerializationError, "JSON I/O operation failed")
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`mailchimp_config::shared::ValidationError`] to [`SinkError`] with
/// [`ErrorKind::ConfigError`].
impl From<mailchimp_config::shared::ValidationError> for SinkError {
    #[track_caller]
    fn from(err: mailchimp_config::shared::ValidationError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid sink configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
