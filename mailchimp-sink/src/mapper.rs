//! Conversion of upstream rows into MailChimp subscribers.

use mailchimp_config::shared::SinkConfig;
use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::{Grouping, MergeFields, Row, Schema, SubscriberEntry, Value};

/// Separator between group names inside a grouping column value.
const GROUP_SEPARATOR: char = ',';

/// A configured grouping column and its position in the schema, if present.
#[derive(Debug, Clone)]
struct GroupingColumn {
    name: String,
    index: Option<usize>,
}

/// An additional merge var and the schema position it is read from.
#[derive(Debug, Clone)]
struct MergeColumn {
    tag: String,
    index: usize,
}

/// Maps rows to [`SubscriberEntry`] values using column positions resolved once per schema.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    email_index: usize,
    fname_index: Option<usize>,
    lname_index: Option<usize>,
    /// [`None`] when no grouping columns are configured.
    grouping_columns: Option<Vec<GroupingColumn>>,
    merge_columns: Vec<MergeColumn>,
    language_index: Option<usize>,
}

impl RecordMapper {
    /// Resolves the configured columns against `schema`.
    ///
    /// Fails with [`ErrorKind::MissingSchemaColumn`] when the email column is not part of the
    /// schema. Missing name columns are ignored. Missing grouping, merge and language columns
    /// are warned about and never sent.
    pub fn new(config: &SinkConfig, schema: &Schema) -> SinkResult<Self> {
        let Some(email_index) = schema.index_of(&config.email_column) else {
            bail!(
                ErrorKind::MissingSchemaColumn,
                "Schema is missing the email column",
                format!("schema has no '{}' column", config.email_column)
            );
        };

        let fname_index = schema.index_of(&config.fname_column);
        let lname_index = schema.index_of(&config.lname_column);
        if fname_index.is_none() || lname_index.is_none() {
            debug!(
                fname_column = %config.fname_column,
                lname_column = %config.lname_column,
                "name columns missing from the schema are not sent"
            );
        }

        let grouping_columns = config
            .grouping_columns
            .as_ref()
            .filter(|columns| !columns.is_empty())
            .map(|columns| {
                columns
                    .iter()
                    .map(|name| {
                        let index = schema.index_of(name);
                        if index.is_none() {
                            warn!(column = %name, "grouping column is not part of the schema");
                        }

                        GroupingColumn {
                            name: name.clone(),
                            index,
                        }
                    })
                    .collect()
            });

        let merge_columns = config
            .merge_fields
            .iter()
            .flatten()
            .filter_map(|name| match schema.find_ignore_case(name) {
                Some((index, column)) => Some(MergeColumn {
                    tag: column.to_ascii_uppercase(),
                    index,
                }),
                None => {
                    warn!(column = %name, "merge field column is not part of the schema");
                    None
                }
            })
            .collect();

        let language_index = config
            .language_column
            .as_deref()
            .filter(|name| !name.is_empty())
            .and_then(|name| {
                let index = schema.index_of(name);
                if index.is_none() {
                    warn!(column = %name, "language column is not part of the schema");
                }
                index
            });

        Ok(Self {
            email_index,
            fname_index,
            lname_index,
            grouping_columns,
            merge_columns,
            language_index,
        })
    }

    /// Maps one row, returning [`None`] when the row carries no email.
    pub fn map(&self, row: &Row) -> Option<SubscriberEntry> {
        let email = text_at(row, Some(self.email_index))?;

        let groupings = self.grouping_columns.as_ref().map(|columns| {
            columns
                .iter()
                .filter_map(|column| {
                    let value = text_at(row, column.index)?;
                    Some(Grouping {
                        name: column.name.clone(),
                        groups: value.split(GROUP_SEPARATOR).map(str::to_owned).collect(),
                    })
                })
                .collect()
        });

        Some(SubscriberEntry {
            email,
            merge_fields: MergeFields {
                fname: text_at(row, self.fname_index),
                lname: text_at(row, self.lname_index),
                groupings,
                language: text_at(row, self.language_index),
                extra: self
                    .merge_columns
                    .iter()
                    .filter_map(|column| {
                        Some((column.tag.clone(), text_at(row, Some(column.index))?))
                    })
                    .collect(),
            },
        })
    }
}

/// Reads the value at `index` as non-empty text.
fn text_at(row: &Row, index: Option<usize>) -> Option<String> {
    index
        .and_then(|index| row.get(index))
        .and_then(Value::to_text)
        .map(|text| text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SinkConfig {
        SinkConfig::new("abc-us1", "list")
    }

    fn row(values: Vec<Value>) -> Row {
        Row::new(values)
    }

    #[test]
    fn test_maps_email_and_names() {
        let schema = Schema::new(["email", "fname", "lname"]);
        let mapper = RecordMapper::new(&config(), &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), "Ann".into(), "Lee".into()]))
            .unwrap();

        assert_eq!(entry.email, "a@example.com");
        assert_eq!(entry.merge_fields.fname.as_deref(), Some("Ann"));
        assert_eq!(entry.merge_fields.lname.as_deref(), Some("Lee"));
        assert_eq!(entry.merge_fields.groupings, None);
    }

    #[test]
    fn test_missing_email_column_is_a_configuration_error() {
        let mut config = config();
        config.email_column = "e_mail".to_owned();
        let schema = Schema::new(["email", "fname"]);

        let err = RecordMapper::new(&config, &schema).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingSchemaColumn);
        assert_eq!(err.detail(), Some("schema has no 'e_mail' column"));
    }

    #[test]
    fn test_absent_email_yields_none() {
        let schema = Schema::new(["email", "fname"]);
        let mapper = RecordMapper::new(&config(), &schema).unwrap();

        assert_eq!(mapper.map(&row(vec![Value::Null, "Ann".into()])), None);
        assert_eq!(mapper.map(&row(vec!["".into(), "Ann".into()])), None);
        assert_eq!(mapper.map(&row(vec![])), None);
    }

    #[test]
    fn test_name_fields_are_omitted_when_absent() {
        let schema = Schema::new(["email", "fname", "lname"]);
        let mapper = RecordMapper::new(&config(), &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), "".into()]))
            .unwrap();

        assert_eq!(entry.merge_fields.fname, None);
        assert_eq!(entry.merge_fields.lname, None);
    }

    #[test]
    fn test_name_columns_missing_from_schema_are_omitted() {
        let schema = Schema::new(["email"]);
        let mapper = RecordMapper::new(&config(), &schema).unwrap();

        let entry = mapper.map(&row(vec!["a@example.com".into()])).unwrap();

        assert_eq!(entry.merge_fields, MergeFields::default());
    }

    #[test]
    fn test_groupings_split_on_commas() {
        let mut config = config();
        config.grouping_columns = Some(vec!["interests".to_owned(), "langs".to_owned()]);
        let schema = Schema::new(["email", "interests", "langs"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper
            .map(&row(vec![
                "a@example.com".into(),
                "group_1,group_2".into(),
                "en".into(),
            ]))
            .unwrap();

        assert_eq!(
            entry.merge_fields.groupings,
            Some(vec![
                Grouping {
                    name: "interests".to_owned(),
                    groups: vec!["group_1".to_owned(), "group_2".to_owned()],
                },
                Grouping {
                    name: "langs".to_owned(),
                    groups: vec!["en".to_owned()],
                },
            ])
        );
    }

    #[test]
    fn test_numeric_grouping_values_are_stringified() {
        let mut config = config();
        config.grouping_columns = Some(vec!["interests".to_owned()]);
        let schema = Schema::new(["email", "interests"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let integer = mapper
            .map(&row(vec!["a@example.com".into(), Value::I64(42)]))
            .unwrap();
        let double = mapper
            .map(&row(vec!["a@example.com".into(), Value::F64(1.3)]))
            .unwrap();

        assert_eq!(
            integer.merge_fields.groupings.unwrap()[0].groups,
            vec!["42".to_owned()]
        );
        assert_eq!(
            double.merge_fields.groupings.unwrap()[0].groups,
            vec!["1.3".to_owned()]
        );
    }

    #[test]
    fn test_empty_grouping_values_leave_groupings_present_and_empty() {
        let mut config = config();
        config.grouping_columns = Some(vec!["interests".to_owned(), "unknown".to_owned()]);
        let schema = Schema::new(["email", "interests"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), Value::Null]))
            .unwrap();

        assert_eq!(entry.merge_fields.groupings, Some(vec![]));
    }

    #[test]
    fn test_empty_grouping_column_list_omits_groupings() {
        let mut config = config();
        config.grouping_columns = Some(vec![]);
        let schema = Schema::new(["email"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper.map(&row(vec!["a@example.com".into()])).unwrap();

        assert_eq!(entry.merge_fields.groupings, None);
    }

    #[test]
    fn test_merge_fields_are_tagged_with_the_upper_cased_schema_column() {
        let mut config = config();
        config.merge_fields = Some(vec!["City".to_owned(), "zip".to_owned(), "phone".to_owned()]);
        let schema = Schema::new(["email", "city", "ZIP"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), "Oslo".into(), Value::I64(150)]))
            .unwrap();

        assert_eq!(
            entry.merge_fields.extra.into_iter().collect::<Vec<_>>(),
            [
                ("CITY".to_owned(), "Oslo".to_owned()),
                ("ZIP".to_owned(), "150".to_owned()),
            ]
        );
    }

    #[test]
    fn test_absent_merge_field_values_are_omitted() {
        let mut config = config();
        config.merge_fields = Some(vec!["city".to_owned()]);
        let schema = Schema::new(["email", "city"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), Value::Null]))
            .unwrap();

        assert!(entry.merge_fields.extra.is_empty());
    }

    #[test]
    fn test_language_is_read_from_the_configured_column() {
        let mut config = config();
        config.language_column = Some("lang".to_owned());
        let schema = Schema::new(["email", "lang"]);
        let mapper = RecordMapper::new(&config, &schema).unwrap();

        let entry = mapper
            .map(&row(vec!["a@example.com".into(), "fr".into()]))
            .unwrap();

        assert_eq!(entry.merge_fields.language.as_deref(), Some("fr"));
    }

    #[test]
    fn test_unknown_or_empty_language_column_is_not_sent() {
        let schema = Schema::new(["email", "lang"]);
        let values = vec!["a@example.com".into(), "fr".into()];

        for column in ["", "locale"] {
            let mut config = config();
            config.language_column = Some(column.to_owned());
            let mapper = RecordMapper::new(&config, &schema).unwrap();

            let entry = mapper.map(&row(values.clone())).unwrap();

            assert_eq!(entry.merge_fields.language, None);
        }
    }
}
