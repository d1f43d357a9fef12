use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single typed cell. Missing cells are represented as `None` at the
/// column level, never as a `Value` variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// JSON rendering for preview payloads; temporal values become ISO strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// One named column of equal length with its dataset siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter_map(|v| v.as_ref())
    }
}

/// An ephemeral in-memory tabular dataset: ordered named columns, each an
/// ordered sequence of optional values of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Parses a cell as a timestamp: datetime formats first, then bare dates
/// (promoted to midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_naive_datetime(trimmed)
        .or_else(|| parse_naive_date(trimmed).map(|d| d.and_time(NaiveTime::MIN)))
}

/// The fixed truthy/falsy spellings a boolean column may draw from.
pub fn parse_boolean_literal(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Lenient numeric coercion. Strings parse through `f64`; temporal and
/// boolean values never coerce.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Boolean(_) | Value::Date(_) | Value::DateTime(_) => None,
    }
}

/// Coercion to a timestamp for already-typed and string cells alike.
pub fn coerce_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::DateTime(dt) => Some(*dt),
        Value::String(s) => parse_timestamp(s),
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
    }

    #[test]
    fn parse_timestamp_promotes_bare_dates_to_midnight() {
        let parsed = parse_timestamp("2024-05-06").unwrap();
        assert_eq!(parsed.time(), NaiveTime::MIN);
        assert_eq!(
            parse_timestamp("2024-05-06 14:30:00").unwrap().hour(),
            14,
            "datetime formats take precedence"
        );
    }

    #[test]
    fn parse_boolean_literal_accepts_fixed_spellings_only() {
        assert_eq!(parse_boolean_literal("YES"), Some(true));
        assert_eq!(parse_boolean_literal("0"), Some(false));
        assert_eq!(parse_boolean_literal("maybe"), None);
        assert_eq!(parse_boolean_literal("t"), None);
    }

    #[test]
    fn coerce_numeric_handles_strings_and_rejects_temporals() {
        assert_eq!(coerce_numeric(&Value::String(" 12.5 ".into())), Some(12.5));
        assert_eq!(coerce_numeric(&Value::Integer(3)), Some(3.0));
        assert_eq!(coerce_numeric(&Value::String("n/a".into())), None);
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(coerce_numeric(&date), None);
    }

    #[test]
    fn dataset_row_count_is_zero_when_empty() {
        assert_eq!(Dataset::default().row_count(), 0);
        let ds = Dataset::new(vec![Column::new("a", vec![None, None])]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column("a").unwrap().null_count(), 2);
    }
}
