//! Decoding raw upload bytes into an in-memory [`Dataset`].
//!
//! Dispatch is by file extension. Delimited text goes through an ordered list
//! of candidate encodings, taking the first that decodes without error; plain
//! `.txt` tries tab-delimited parsing before falling back to comma. Workbooks
//! are read from the first sheet. There is no partial-success mode: the
//! caller gets a dataset with a header row or a typed failure.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader as _, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{Column, Dataset, Value, parse_timestamp},
    error::{IngestError, Result},
};

/// Candidate encodings for delimited text, tried in order.
const ENCODING_LABELS: &[&str] = &["utf-8", "latin-1", "iso-8859-1", "windows-1252"];

pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "txt"];

pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_allowed_extension(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reads `bytes` into a dataset according to the filename's extension.
pub fn read_dataset(bytes: &[u8], filename: &str) -> Result<Dataset> {
    let extension = extension_of(filename).ok_or_else(|| IngestError::UnsupportedFormat {
        extension: String::new(),
    })?;

    match extension.as_str() {
        "csv" => read_delimited(&decode_text(bytes)?, b','),
        "txt" => {
            let text = decode_text(bytes)?;
            match read_delimited(&text, b'\t') {
                Ok(dataset) => Ok(dataset),
                Err(err) => {
                    debug!("tab-delimited parse failed ({err}), retrying as comma-delimited");
                    read_delimited(&text, b',')
                }
            }
        }
        "xlsx" | "xls" => read_workbook(bytes),
        other => Err(IngestError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

fn decode_text(bytes: &[u8]) -> Result<String> {
    for label in ENCODING_LABELS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            debug!("decoded {} byte(s) as {}", bytes.len(), encoding.name());
            return Ok(text.into_owned());
        }
    }
    Err(IngestError::Decode {
        reason: "could not decode file with common encodings".to_string(),
    })
}

fn read_delimited(text: &str, delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| IngestError::Decode {
            reason: err.to_string(),
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        return Err(IngestError::Decode {
            reason: "file contains no header row".to_string(),
        });
    }

    let mut columns: Vec<Column> = headers
        .into_iter()
        .map(|name| Column::new(name, Vec::new()))
        .collect();

    for record in reader.records() {
        let record = record.map_err(|err| IngestError::Decode {
            reason: err.to_string(),
        })?;
        for (idx, column) in columns.iter_mut().enumerate() {
            let cell = record.get(idx).unwrap_or("");
            column.values.push(if cell.is_empty() {
                None
            } else {
                Some(Value::String(cell.to_string()))
            });
        }
    }

    Ok(Dataset::new(columns))
}

fn read_workbook(bytes: &[u8]) -> Result<Dataset> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|err| IngestError::Decode {
        reason: err.to_string(),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Decode {
            reason: "workbook contains no sheets".to_string(),
        })?
        .map_err(|err| IngestError::Decode {
            reason: err.to_string(),
        })?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or_else(|| IngestError::Decode {
        reason: "first sheet contains no header row".to_string(),
    })?;

    let mut columns: Vec<Column> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let name = match cell_value(cell) {
                Some(value) => value.as_display(),
                None => format!("field_{idx}"),
            };
            Column::new(name, Vec::new())
        })
        .collect();

    for row in rows {
        for (idx, column) in columns.iter_mut().enumerate() {
            column.values.push(row.get(idx).and_then(cell_value));
        }
    }

    Ok(Dataset::new(columns))
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(Value::String(s.clone()))
            }
        }
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => dt.as_datetime().map(Value::DateTime),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(Value::DateTime)
            .or_else(|| Some(Value::String(s.clone()))),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}
