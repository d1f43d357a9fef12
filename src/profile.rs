//! Structural profiling and semantic-role suggestion.
//!
//! Role suggestion is a substring search over the normalized column name, not
//! a token match: `product_id` lands in the `sku` family via `id`. Families
//! and the keywords inside them are checked in declaration order, first match
//! wins.

use std::fmt;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Column, Dataset, Value},
    infer::{self, ColumnKind},
    normalize::normalize_name,
};

const SAMPLE_VALUES_PER_COLUMN: usize = 5;

/// The inferred business meaning of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    Date,
    Sku,
    Quantity,
    Revenue,
    Stock,
    Category,
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SemanticRole::Date => "date",
            SemanticRole::Sku => "sku",
            SemanticRole::Quantity => "quantity",
            SemanticRole::Revenue => "revenue",
            SemanticRole::Stock => "stock",
            SemanticRole::Category => "category",
        };
        write!(f, "{label}")
    }
}

/// Keyword families in declaration order; order decides ties.
const ROLE_KEYWORDS: &[(SemanticRole, &[&str])] = &[
    (
        SemanticRole::Date,
        &["date", "day", "time", "timestamp", "datetime", "dt", "period"],
    ),
    (
        SemanticRole::Sku,
        &["sku", "product_id", "item_id", "product_code", "item_code", "id"],
    ),
    (
        SemanticRole::Quantity,
        &["quantity", "qty", "amount", "count", "units", "volume"],
    ),
    (
        SemanticRole::Revenue,
        &["revenue", "sales", "price", "total", "amount", "value", "turnover"],
    ),
    (
        SemanticRole::Stock,
        &["stock", "inventory", "on_hand", "available", "balance"],
    ),
    (
        SemanticRole::Category,
        &["category", "type", "group", "department", "class", "segment"],
    ),
];

pub fn suggest_role(column_name: &str) -> Option<SemanticRole> {
    let normalized = normalize_name(column_name);
    for (role, keywords) in ROLE_KEYWORDS {
        for keyword in *keywords {
            if normalized.contains(keyword) {
                return Some(*role);
            }
        }
    }
    None
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub detected_type: ColumnKind,
    pub suggested_role: Option<SemanticRole>,
    pub null_count: usize,
    pub null_percentage: f64,
    pub distinct_count: usize,
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaProfile {
    pub columns: Vec<ColumnProfile>,
    pub row_count: usize,
    pub column_count: usize,
    pub suggested_date_column: Option<String>,
    pub suggested_sku_column: Option<String>,
    pub memory_usage_mb: f64,
}

/// Builds the full structural profile for a dataset. Never fails on
/// well-formed input; an empty dataset produces zeroed per-column stats and
/// is flagged downstream by the validator.
pub fn build_profile(dataset: &Dataset) -> SchemaProfile {
    let row_count = dataset.row_count();
    let mut columns = Vec::with_capacity(dataset.column_count());
    let mut suggested_date: Option<String> = None;
    let mut suggested_sku: Option<String> = None;
    let mut approx_bytes = 0usize;

    for column in &dataset.columns {
        let detected_type = infer::classify(column);
        let suggested_role = suggest_role(&column.name);
        let non_null: Vec<&Value> = column.non_null().collect();
        let null_count = column.values.len() - non_null.len();
        let null_percentage = if row_count == 0 {
            0.0
        } else {
            null_count as f64 / row_count as f64 * 100.0
        };

        approx_bytes += column_bytes(column);

        if suggested_role == Some(SemanticRole::Date)
            && suggested_date.is_none()
            && detected_type.is_temporal()
        {
            suggested_date = Some(column.name.clone());
        }
        if suggested_role == Some(SemanticRole::Sku) && suggested_sku.is_none() {
            suggested_sku = Some(column.name.clone());
        }

        columns.push(ColumnProfile {
            name: column.name.clone(),
            detected_type,
            suggested_role,
            null_count,
            null_percentage,
            distinct_count: infer::distinct_count(&non_null),
            sample_values: non_null
                .iter()
                .take(SAMPLE_VALUES_PER_COLUMN)
                .map(|v| v.as_display())
                .collect(),
        });
    }

    SchemaProfile {
        column_count: columns.len(),
        columns,
        row_count,
        suggested_date_column: suggested_date,
        suggested_sku_column: suggested_sku,
        memory_usage_mb: approx_bytes as f64 / 1024.0 / 1024.0,
    }
}

fn column_bytes(column: &Column) -> usize {
    column.name.len()
        + column
            .values
            .iter()
            .map(|v| {
                mem::size_of::<Option<Value>>()
                    + match v {
                        Some(Value::String(s)) => s.len(),
                        _ => 0,
                    }
            })
            .sum::<usize>()
}
