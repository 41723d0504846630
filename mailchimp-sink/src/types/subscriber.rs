use std::collections::BTreeMap;

/// One subscriber to add or update, derived from a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEntry {
    /// Identity of the subscriber within the list.
    pub email: String,
    pub merge_fields: MergeFields,
}

impl SubscriberEntry {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            merge_fields: MergeFields::default(),
        }
    }
}

/// Merge fields sent with a subscriber.
///
/// Absent values are [`None`] and omitted from the request, never sent as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeFields {
    pub fname: Option<String>,
    pub lname: Option<String>,
    /// [`None`] when no grouping columns are configured.
    pub groupings: Option<Vec<Grouping>>,
    /// Language code of the subscriber, sent as `mc_language`.
    pub language: Option<String>,
    /// Additional merge vars keyed by their upper-cased tag.
    pub extra: BTreeMap<String, String>,
}

/// Interest group membership read from one grouping column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    /// Name of the grouping, which is the column name.
    pub name: String,
    pub groups: Vec<String>,
}
