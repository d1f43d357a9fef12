//! Persistent domain records: uploads, their lifecycle, and the cleaned
//! sales rows the pipeline commits.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{profile::SchemaProfile, validate::ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Processing => "processing",
            UploadStatus::Processed => "processed",
            UploadStatus::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// One caller-submitted file and its processing lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Upload {
    pub id: Uuid,
    pub filename: String,
    pub file_size_bytes: u64,
    pub row_count: Option<usize>,
    pub column_count: Option<usize>,
    pub detected_schema: Option<SchemaProfile>,
    pub validation_report: Option<ValidationReport>,
    pub column_mapping: Option<BTreeMap<String, String>>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Upload {
    pub fn new(id: Uuid, filename: impl Into<String>, file_size_bytes: u64) -> Self {
        Self {
            id,
            filename: filename.into(),
            file_size_bytes,
            row_count: None,
            column_count: None,
            detected_schema: None,
            validation_report: None,
            column_mapping: None,
            status: UploadStatus::Uploaded,
            error_message: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// One cleaned, mapped sales row. Immutable once committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesRecord {
    pub upload_id: Uuid,
    pub date: NaiveDateTime,
    pub sku_id: String,
    pub sales_quantity: f64,
    pub unit_price: f64,
    pub sales_revenue: f64,
    pub stock_level: i64,
    pub category: String,
}

/// Statistics returned from a successful processing run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStats {
    pub rows_processed: usize,
    pub rows_inserted: usize,
}

/// The capped would-be result of a run, for caller inspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewPayload {
    pub preview: Vec<BTreeMap<String, serde_json::Value>>,
    pub total_rows: usize,
    pub columns: Vec<String>,
}
