//! Column mapping and default filling.
//!
//! All three operations are pure dataset-to-dataset transformations: renames
//! never validate target names, the value-level fill never fails, and the
//! required-column fill only adds columns, never overwrites one.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};

use crate::data::{Column, Dataset, Value};

/// Renames columns according to a caller-supplied source → target table.
/// Columns absent from the mapping pass through unchanged.
pub fn apply_mapping(mut dataset: Dataset, mapping: &BTreeMap<String, String>) -> Dataset {
    for column in &mut dataset.columns {
        if let Some(target) = mapping.get(&column.name) {
            column.name = target.clone();
        }
    }
    dataset
}

/// Fills null cells in typed columns with type-appropriate defaults:
/// numerics to zero, booleans to false, temporals to the column's most
/// frequent value (falling back to the processing day), text to empty.
pub fn fill_missing_values(mut dataset: Dataset, today: NaiveDate) -> Dataset {
    for column in &mut dataset.columns {
        if column.null_count() == 0 {
            continue;
        }
        let fill = fill_value_for(column, today);
        for cell in &mut column.values {
            if cell.is_none() {
                *cell = Some(fill.clone());
            }
        }
    }
    dataset
}

fn fill_value_for(column: &Column, today: NaiveDate) -> Value {
    match column.non_null().next() {
        Some(Value::Integer(_)) => Value::Integer(0),
        Some(Value::Float(_)) => Value::Float(0.0),
        Some(Value::Boolean(_)) => Value::Boolean(false),
        Some(Value::Date(_)) => mode_value(column).unwrap_or(Value::Date(today)),
        Some(Value::DateTime(_)) => {
            mode_value(column).unwrap_or(Value::DateTime(today.and_time(NaiveTime::MIN)))
        }
        Some(Value::String(_)) | None => Value::String(String::new()),
    }
}

/// Most frequent non-null value; ties resolve to the earliest-seen value.
fn mode_value(column: &Column) -> Option<Value> {
    let mut counts: HashMap<String, (usize, usize, &Value)> = HashMap::new();
    for (position, value) in column.non_null().enumerate() {
        let entry = counts
            .entry(value.as_display())
            .or_insert((0, position, value));
        entry.0 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, _, value)| value.clone())
}

/// The target schema's required columns and their defaults.
pub fn required_columns(today: NaiveDate) -> Vec<(&'static str, Value)> {
    vec![
        ("date", Value::Date(today)),
        ("sku_id", Value::String("UNKNOWN".to_string())),
        ("sales_quantity", Value::Float(0.0)),
        ("unit_price", Value::Float(0.0)),
        ("sales_revenue", Value::Float(0.0)),
        ("stock_level", Value::Integer(0)),
        ("category", Value::String(String::new())),
    ]
}

/// Guarantees every required column exists, appending a constant column for
/// each one that never appeared. Existing columns are left untouched.
pub fn fill_required_columns(mut dataset: Dataset, today: NaiveDate) -> Dataset {
    let row_count = dataset.row_count();
    for (name, default) in required_columns(today) {
        if dataset.has_column(name) {
            continue;
        }
        dataset
            .columns
            .push(Column::new(name, vec![Some(default); row_count]));
    }
    dataset
}
