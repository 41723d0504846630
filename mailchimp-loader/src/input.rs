//! JSON-lines row input.
//!
//! Each non-blank line holds one row, either as an array of values in column order or as an
//! object keyed by column name.

use std::path::Path;

use mailchimp_sink::error::{ErrorKind, SinkError};
use mailchimp_sink::types::{Row, Schema, Value};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::error::LoaderResult;

/// Reads pages of rows from JSON lines.
pub struct RowReader<R> {
    lines: Lines<R>,
    schema: Schema,
    line_number: usize,
}

/// Input source chosen at runtime.
pub type BoxedInput = Box<dyn AsyncBufRead + Unpin + Send>;

impl RowReader<BoxedInput> {
    /// Opens `path`, or stdin when no path is given.
    pub async fn open(path: Option<&Path>, schema: Schema) -> LoaderResult<Self> {
        let input: BoxedInput = match path {
            Some(path) => Box::new(BufReader::new(File::open(path).await?)),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };

        Ok(Self::new(input, schema))
    }
}

impl<R> RowReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(input: R, schema: Schema) -> Self {
        Self {
            lines: input.lines(),
            schema,
            line_number: 0,
        }
    }

    /// Reads up to `page_size` rows. An empty page means the input is exhausted.
    pub async fn next_page(&mut self, page_size: usize) -> LoaderResult<Vec<Row>> {
        let mut page = Vec::with_capacity(page_size.min(1024));

        while page.len() < page_size {
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            page.push(parse_row(&line, self.line_number, &self.schema)?);
        }

        Ok(page)
    }
}

/// Parses one line into a row ordered by `schema`.
///
/// Object keys missing from the line become nulls and keys outside the schema are ignored.
pub fn parse_row(line: &str, line_number: usize, schema: &Schema) -> Result<Row, SinkError> {
    let json: serde_json::Value = serde_json::from_str(line).map_err(|err| {
        SinkError::from((
            ErrorKind::InvalidData,
            "Malformed input line",
            format!("line {line_number} is not valid JSON: {err}"),
        ))
        .with_source(err)
    })?;

    match json {
        serde_json::Value::Array(values) => Ok(values.into_iter().map(Value::from).collect()),
        serde_json::Value::Object(mut fields) => Ok(schema
            .columns()
            .iter()
            .map(|column| fields.remove(column).map(Value::from).unwrap_or(Value::Null))
            .collect()),
        other => Err(SinkError::from((
            ErrorKind::InvalidData,
            "Malformed input line",
            format!(
                "line {line_number} must hold a JSON array or object, found `{}`",
                truncate(&other.to_string())
            ),
        ))),
    }
}

fn truncate(text: &str) -> &str {
    const MAX_CHARS: usize = 64;

    match text.char_indices().nth(MAX_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
