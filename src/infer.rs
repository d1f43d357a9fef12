//! Per-column type inference.
//!
//! Two modes share one threshold constant: [`classify`] decides a column's
//! semantic type for profiling, and [`convert_types`] rewrites column values
//! for the processing pipeline, turning unparsable cells into nulls rather
//! than failing.
//!
//! Classification order is load-bearing: timestamps before numerics, numerics
//! before booleans, booleans before the cardinality check, so a mostly-numeric
//! column with stray tokens is never miscategorized as categorical and a
//! boolean-like column is never swallowed by it.

use chrono::NaiveTime;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::data::{Column, Dataset, Value, coerce_numeric, coerce_timestamp};

/// Minimum share of non-null values that must coerce for a column to count
/// as numeric, in both inference modes.
pub const NUMERIC_THRESHOLD: f64 = 0.8;

const CATEGORICAL_MAX_RATIO: f64 = 0.1;
const CATEGORICAL_MAX_DISTINCT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Integer,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Boolean,
    Categorical,
    Text,
    Unknown,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Numeric | ColumnKind::Integer)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnKind::Date | ColumnKind::DateTime)
    }
}

/// Classifies one column independently of all others.
pub fn classify(column: &Column) -> ColumnKind {
    let non_null: Vec<&Value> = column.non_null().collect();
    if non_null.is_empty() {
        return ColumnKind::Unknown;
    }

    // Full-column timestamp parse: date when every value sits at midnight.
    let timestamps: Vec<_> = non_null
        .iter()
        .filter_map(|v| coerce_timestamp(v))
        .collect();
    if timestamps.len() == non_null.len() {
        return if timestamps.iter().all(|ts| ts.time() == NaiveTime::MIN) {
            ColumnKind::Date
        } else {
            ColumnKind::DateTime
        };
    }

    let coerced: Vec<f64> = non_null.iter().filter_map(|v| coerce_numeric(v)).collect();
    if coerced.len() as f64 >= non_null.len() as f64 * NUMERIC_THRESHOLD {
        return if coerced.iter().all(|f| f.fract() == 0.0) {
            ColumnKind::Integer
        } else {
            ColumnKind::Numeric
        };
    }

    let all_boolean = non_null.iter().all(|v| match v {
        Value::Boolean(_) => true,
        Value::Integer(i) => *i == 0 || *i == 1,
        Value::String(s) => crate::data::parse_boolean_literal(s).is_some(),
        Value::Float(_) | Value::Date(_) | Value::DateTime(_) => false,
    });
    if all_boolean {
        return ColumnKind::Boolean;
    }

    let distinct = distinct_count(&non_null);
    let ratio = distinct as f64 / non_null.len() as f64;
    if ratio < CATEGORICAL_MAX_RATIO && distinct < CATEGORICAL_MAX_DISTINCT {
        return ColumnKind::Categorical;
    }

    ColumnKind::Text
}

pub fn distinct_count(values: &[&Value]) -> usize {
    values.iter().map(|v| v.as_display()).unique().count()
}

/// Full-convert mode: rewrites each column in place when enough of it
/// coerces. Numeric coercion is attempted first, then timestamps, matching
/// the processing pipeline's cleaning order. Cells that fail to coerce
/// become nulls, never zeros.
pub fn convert_types(mut dataset: Dataset) -> Dataset {
    for column in &mut dataset.columns {
        convert_column(column);
    }
    dataset
}

fn convert_column(column: &mut Column) {
    let non_null_count = column.non_null().count();
    if non_null_count == 0 {
        return;
    }
    let threshold = non_null_count as f64 * NUMERIC_THRESHOLD;

    let coerced: Vec<Option<f64>> = column
        .values
        .iter()
        .map(|v| v.as_ref().and_then(coerce_numeric))
        .collect();
    let numeric_hits = coerced.iter().flatten().count();
    if numeric_hits as f64 >= threshold {
        let integral = coerced.iter().flatten().all(|f| f.fract() == 0.0);
        column.values = coerced
            .into_iter()
            .map(|f| {
                f.map(|f| {
                    if integral {
                        Value::Integer(f as i64)
                    } else {
                        Value::Float(f)
                    }
                })
            })
            .collect();
        return;
    }

    let timestamps: Vec<_> = column
        .values
        .iter()
        .map(|v| v.as_ref().and_then(coerce_timestamp))
        .collect();
    let timestamp_hits = timestamps.iter().flatten().count();
    if timestamp_hits as f64 >= threshold {
        let all_midnight = timestamps
            .iter()
            .flatten()
            .all(|ts| ts.time() == NaiveTime::MIN);
        column.values = timestamps
            .into_iter()
            .map(|ts| {
                ts.map(|ts| {
                    if all_midnight {
                        Value::Date(ts.date())
                    } else {
                        Value::DateTime(ts)
                    }
                })
            })
            .collect();
    }
}
