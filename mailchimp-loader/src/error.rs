use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use mailchimp_sink::error::SinkError;
use mailchimp_sink::retry::build_retry_policy;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the loader binary.
///
/// Wraps [`SinkError`] for write failures and provides variants for the loader's own setup
/// and input handling.
#[derive(Debug)]
pub enum LoaderError {
    /// Sink error, including malformed input rows.
    Sink(SinkError),
    /// Configuration or startup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error while reading input.
    Io(std::io::Error, CapturedBacktrace),
}

impl LoaderError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            LoaderError::Sink(_) => "sink error",
            LoaderError::Config(_, _) => "configuration error",
            LoaderError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        match self {
            LoaderError::Sink(err) => err.backtrace(),
            LoaderError::Config(_, cb) => &cb.0,
            LoaderError::Io(_, cb) => &cb.0,
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        LoaderError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns the sink error, if this is one.
    pub fn as_sink_error(&self) -> Option<&SinkError> {
        match self {
            LoaderError::Sink(err) => Some(err),
            _ => None,
        }
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("loader failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        if let Some(err) = self.as_sink_error() {
            out.push_str(&format!("class: {}\n", err.class()));
        }
        out.push_str(&format!("error: {}\n", self));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if let Some(solution) = self
            .as_sink_error()
            .and_then(|err| build_retry_policy(err).solution())
        {
            out.push_str(&format!("solution: {solution}\n"));
        }

        if should_render_backtrace() {
            out.push_str("backtrace:\n");
            out.push_str(&self.backtrace().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Sink(err) => write!(f, "{err}"),
            LoaderError::Config(source, _) => write!(f, "configuration error: {source}"),
            LoaderError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Sink(err) => err.source(),
            LoaderError::Config(source, _) => Some(source.as_ref()),
            LoaderError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SinkError> for LoaderError {
    fn from(err: SinkError) -> Self {
        LoaderError::Sink(err)
    }
}

#[cfg(test)]
mod tests {
    use mailchimp_config::shared::ValidationError;
    use mailchimp_sink::error::ErrorKind;

    use super::*;

    #[test]
    fn test_report_includes_category_and_solution() {
        let err = LoaderError::from(SinkError::from((
            ErrorKind::AuthenticationError,
            "MailChimp rejected the credentials",
        )));

        let report = err.render_report();

        assert!(report.starts_with("loader failed\n"));
        assert!(report.contains("category: sink error\n"));
        assert!(report.contains("class: configuration error\n"));
        assert!(report.contains("solution: "));
    }

    #[test]
    fn test_report_lists_causes() {
        let err = LoaderError::config(ValidationError::EmptyField("sink.list_id"));

        let report = err.render_report();

        assert!(report.contains("category: configuration error\n"));
        assert!(report.contains("cause 1: `sink.list_id` must not be empty\n"));
        assert!(!report.contains("solution: "));
    }

    #[test]
    fn test_io_errors_convert() {
        let err = LoaderError::from(std::io::Error::other("disk gone"));

        assert_eq!(err.category(), "i/o error");
        assert_eq!(err.to_string(), "i/o error: disk gone");
    }
}
