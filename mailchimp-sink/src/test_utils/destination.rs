use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use mailchimp_config::shared::SinkConfig;
use tokio::sync::Mutex;

use crate::destination::{
    BulkSubscribeReport, BulkSubscribeRequest, DestinationConnector, SubscriberDestination,
    SubscriberError,
};
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::types::SubscriberEntry;

/// Error code MailChimp uses for an invalid email address.
const INVALID_EMAIL_CODE: i64 = 502;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<SubscriberEntry>>,
    scripted_failures: VecDeque<ErrorKind>,
    failing_kind: Option<ErrorKind>,
    rejected_emails: HashSet<String>,
    connect_failure: Option<ErrorKind>,
    connects: usize,
}

/// Destination with scripted failures that records every call it receives.
///
/// Calls fail with the queued kinds first, then with the kind set by
/// [`ScriptedDestination::fail_always`], and otherwise succeed. Attempts are recorded whether
/// they fail or not. Clones share their state, so a test keeps a clone to inspect what the
/// sink sent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDestination {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next call with `kind`. Queued failures are consumed in order.
    pub async fn fail_next(&self, kind: ErrorKind) {
        self.inner.lock().await.scripted_failures.push_back(kind);
    }

    /// Fails every call after the queued failures with `kind`.
    pub async fn fail_always(&self, kind: ErrorKind) {
        self.inner.lock().await.failing_kind = Some(kind);
    }

    /// Reports `emails` as rejected individually in successful calls.
    pub async fn reject_emails<I, S>(&self, emails: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock().await;
        inner
            .rejected_emails
            .extend(emails.into_iter().map(Into::into));
    }

    /// Fails every [`DestinationConnector::connect`] with `kind`.
    pub async fn reject_connect(&self, kind: ErrorKind) {
        self.inner.lock().await.connect_failure = Some(kind);
    }

    /// Returns the number of bulk-subscribe calls, failed ones included.
    pub async fn calls(&self) -> usize {
        self.inner.lock().await.batches.len()
    }

    /// Returns the batch of every call, failed ones included, in call order.
    pub async fn batches(&self) -> Vec<Vec<SubscriberEntry>> {
        self.inner.lock().await.batches.clone()
    }

    /// Returns the number of successful connects.
    pub async fn connects(&self) -> usize {
        self.inner.lock().await.connects
    }
}

impl SubscriberDestination for ScriptedDestination {
    fn name() -> &'static str {
        "scripted"
    }

    async fn bulk_subscribe(
        &self,
        request: BulkSubscribeRequest<'_>,
    ) -> SinkResult<BulkSubscribeReport> {
        let mut inner = self.inner.lock().await;
        inner.batches.push(request.entries.to_vec());

        if let Some(kind) = inner.scripted_failures.pop_front().or(inner.failing_kind) {
            return Err(SinkError::from((kind, "scripted destination failure")));
        }

        let errors: Vec<_> = request
            .entries
            .iter()
            .filter(|entry| inner.rejected_emails.contains(&entry.email))
            .map(|entry| SubscriberError {
                email: entry.email.clone(),
                code: INVALID_EMAIL_CODE,
                message: "Invalid Email Address".to_owned(),
            })
            .collect();

        Ok(BulkSubscribeReport {
            add_count: (request.entries.len() - errors.len()) as u64,
            update_count: 0,
            error_count: errors.len() as u64,
            errors,
        })
    }
}

impl DestinationConnector for ScriptedDestination {
    type Destination = ScriptedDestination;

    async fn connect(&self, _config: &SinkConfig) -> SinkResult<ScriptedDestination> {
        let mut inner = self.inner.lock().await;
        if let Some(kind) = inner.connect_failure {
            return Err(SinkError::from((kind, "scripted connect failure")));
        }

        inner.connects += 1;

        Ok(self.clone())
    }
}
