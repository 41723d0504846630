//! Wire format of the MailChimp 2.0 API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::destination::{BulkSubscribeReport, BulkSubscribeRequest, SubscriberError};
use crate::types::SubscriberEntry;

/// Body of `helper/ping`.
#[derive(Debug, Serialize)]
pub struct PingBody<'a> {
    pub apikey: &'a str,
}

/// Response of `helper/ping`.
#[derive(Debug, Deserialize)]
pub struct PingResponse {
    #[serde(default)]
    pub msg: Option<String>,
}

/// Body of `lists/batch-subscribe`.
#[derive(Debug, Serialize)]
pub struct BatchSubscribeBody<'a> {
    pub apikey: &'a str,
    pub id: &'a str,
    pub batch: Vec<WireSubscriber<'a>>,
    pub double_optin: bool,
    pub update_existing: bool,
    pub replace_interests: bool,
}

impl<'a> BatchSubscribeBody<'a> {
    pub fn new(apikey: &'a str, request: BulkSubscribeRequest<'a>) -> Self {
        Self {
            apikey,
            id: request.list_id,
            batch: request.entries.iter().map(WireSubscriber::from).collect(),
            double_optin: request.double_optin,
            update_existing: request.update_existing,
            replace_interests: request.replace_interests,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireSubscriber<'a> {
    pub email: WireEmail<'a>,
    pub merge_vars: WireMergeVars<'a>,
}

impl<'a> From<&'a SubscriberEntry> for WireSubscriber<'a> {
    fn from(entry: &'a SubscriberEntry) -> Self {
        let merge_fields = &entry.merge_fields;

        Self {
            email: WireEmail {
                email: &entry.email,
            },
            merge_vars: WireMergeVars {
                fname: merge_fields.fname.as_deref(),
                lname: merge_fields.lname.as_deref(),
                groupings: merge_fields.groupings.as_ref().map(|groupings| {
                    groupings
                        .iter()
                        .map(|grouping| WireGrouping {
                            name: &grouping.name,
                            groups: &grouping.groups,
                        })
                        .collect()
                }),
                language: merge_fields.language.as_deref(),
                extra: &merge_fields.extra,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireEmail<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WireMergeVars<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fname: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lname: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupings: Option<Vec<WireGrouping<'a>>>,
    #[serde(rename = "mc_language", skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
    /// Additional merge vars, emitted next to the name fields.
    #[serde(flatten)]
    pub extra: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct WireGrouping<'a> {
    pub name: &'a str,
    pub groups: &'a [String],
}

/// Response of `lists/batch-subscribe`.
#[derive(Debug, Deserialize)]
pub struct BatchSubscribeResponse {
    #[serde(default)]
    pub add_count: u64,
    #[serde(default)]
    pub update_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub errors: Vec<WireSubscriberError>,
}

#[derive(Debug, Deserialize)]
pub struct WireSubscriberError {
    #[serde(default)]
    pub email: Option<WireEmailIdentity>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireEmailIdentity {
    #[serde(default)]
    pub email: Option<String>,
}

impl From<BatchSubscribeResponse> for BulkSubscribeReport {
    fn from(response: BatchSubscribeResponse) -> Self {
        let errors = response
            .errors
            .into_iter()
            .map(|error| SubscriberError {
                email: error
                    .email
                    .and_then(|identity| identity.email)
                    .unwrap_or_default(),
                code: error.code.unwrap_or_default(),
                message: error.error.unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        Self {
            add_count: response.add_count,
            update_count: response.update_count,
            // Older API responses omit the count but still list the errors.
            error_count: response.error_count.max(errors.len() as u64),
            errors,
        }
    }
}

/// Error body returned by every API method, `{"status": "error", "code", "name", "error"}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub status: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}
