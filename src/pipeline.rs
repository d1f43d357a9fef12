//! Orchestration of one upload's lifecycle.
//!
//! A run moves the upload through `uploaded → processing → processed` or
//! lands on `error` with the failure message captured verbatim. Each status
//! transition is persisted before the next phase begins, so a crash mid-run
//! is observable as `processing` rather than a stale `uploaded`.
//!
//! The `AlreadyProcessed` guard is checked before the `processing`
//! transition; two concurrent runs against a freshly-uploaded file can both
//! pass it (see DESIGN.md).

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::{
    data::{Dataset, Value, coerce_numeric, coerce_timestamp},
    error::{IngestError, Result},
    infer, normalize,
    model::{PreviewPayload, ProcessStats, SalesRecord, Upload, UploadStatus},
    profile::{self, SchemaProfile},
    reader,
    store::{ByteStore, RecordStore, UploadStore},
    transform,
    validate::{self, ValidationReport},
};

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

pub struct ProcessingPipeline<'a> {
    bytes: &'a dyn ByteStore,
    uploads: &'a dyn UploadStore,
    records: &'a dyn RecordStore,
}

impl<'a> ProcessingPipeline<'a> {
    pub fn new(
        bytes: &'a dyn ByteStore,
        uploads: &'a dyn UploadStore,
        records: &'a dyn RecordStore,
    ) -> Self {
        Self {
            bytes,
            uploads,
            records,
        }
    }

    /// Registers a new upload: checks the extension allow-list and size cap,
    /// persists the blob, and creates the lifecycle record in `uploaded`
    /// status.
    pub fn ingest(&self, filename: &str, data: &[u8]) -> Result<Upload> {
        if !reader::is_allowed_extension(filename) {
            return Err(IngestError::UnsupportedFormat {
                extension: reader::extension_of(filename).unwrap_or_default(),
            });
        }
        let size = data.len() as u64;
        if size > MAX_UPLOAD_BYTES {
            return Err(IngestError::FileTooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let id = Uuid::new_v4();
        self.bytes.save(id, data)?;
        let upload = Upload::new(id, filename, size);
        if let Err(err) = self.uploads.create(&upload) {
            // Do not leave an orphaned blob behind a failed registration.
            let _ = self.bytes.delete(id);
            return Err(err);
        }
        info!("registered upload {id} ({filename}, {size} byte(s))");
        Ok(upload)
    }

    /// Detect phase: read, normalize, convert, profile, and validate,
    /// persisting the results onto the upload. Validation findings are data;
    /// they never fail this call.
    pub fn detect(&self, id: Uuid) -> Result<(SchemaProfile, ValidationReport)> {
        let upload = self.uploads.get(id)?;
        let raw = self.bytes.read(id)?;
        let dataset = reader::read_dataset(&raw, &upload.filename)?;
        let dataset = infer::convert_types(normalize::normalize_columns(dataset));

        let schema = profile::build_profile(&dataset);
        let report = validate::validate(&dataset, &schema);
        info!(
            "detected schema for upload {id}: {} column(s), {} row(s), {}",
            schema.column_count, schema.row_count, report.summary
        );

        let persisted_schema = schema.clone();
        let persisted_report = report.clone();
        self.uploads.update(id, &move |u| {
            u.row_count = Some(persisted_schema.row_count);
            u.column_count = Some(persisted_schema.column_count);
            u.detected_schema = Some(persisted_schema.clone());
            u.validation_report = Some(persisted_report.clone());
        })?;

        Ok((schema, report))
    }

    /// Stores the caller-confirmed column mapping on the upload.
    pub fn set_mapping(&self, id: Uuid, mapping: BTreeMap<String, String>) -> Result<Upload> {
        self.uploads
            .update(id, &move |u| u.column_mapping = Some(mapping.clone()))
    }

    /// Read-only dry run: the identical read/clean/map/fill sequence as
    /// [`process`](Self::process), stopping short of inserting records or
    /// mutating the upload.
    pub fn preview(
        &self,
        id: Uuid,
        mapping: Option<&BTreeMap<String, String>>,
        rows: usize,
    ) -> Result<PreviewPayload> {
        let upload = self.uploads.get(id)?;
        let today = Utc::now().date_naive();
        let dataset = self.cleaned_dataset(&upload, mapping, today)?;

        let preview = (0..dataset.row_count().min(rows))
            .map(|row| {
                dataset
                    .columns
                    .iter()
                    .map(|column| {
                        let cell = column.values[row]
                            .as_ref()
                            .map_or(serde_json::Value::Null, Value::to_json);
                        (column.name.clone(), cell)
                    })
                    .collect()
            })
            .collect();

        Ok(PreviewPayload {
            preview,
            total_rows: dataset.row_count(),
            columns: dataset.column_names(),
        })
    }

    /// Processes the upload into sales records. Fails with
    /// [`IngestError::AlreadyProcessed`] once the upload has reached
    /// `processed`, leaving counts and timestamps untouched.
    pub fn process(
        &self,
        id: Uuid,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> Result<ProcessStats> {
        let upload = self.uploads.get(id)?;
        if upload.status == UploadStatus::Processed {
            return Err(IngestError::AlreadyProcessed { id });
        }

        self.uploads
            .update(id, &|u| u.status = UploadStatus::Processing)?;

        match self.run(&upload, mapping) {
            Ok(stats) => {
                info!(
                    "processed upload {id}: {} row(s) read, {} record(s) inserted",
                    stats.rows_processed, stats.rows_inserted
                );
                Ok(stats)
            }
            Err(err) => {
                let message = err.to_string();
                let _ = self.uploads.update(id, &move |u| {
                    u.status = UploadStatus::Error;
                    u.error_message = Some(message.clone());
                });
                Err(err)
            }
        }
    }

    fn run(
        &self,
        upload: &Upload,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> Result<ProcessStats> {
        let today = Utc::now().date_naive();
        let dataset = self.cleaned_dataset(upload, mapping, today)?;
        let rows_processed = dataset.row_count();
        debug!("upload {}: {} row(s) after cleaning", upload.id, rows_processed);
        if rows_processed == 0 {
            return Err(IngestError::Processing {
                reason: "file contains no data rows".to_string(),
            });
        }

        let records = materialize_records(&dataset, upload.id, today);
        let rows_inserted = self
            .records
            .insert(&records)
            .map_err(|err| IngestError::Processing {
                reason: err.to_string(),
            })?;

        self.uploads.update(upload.id, &|u| {
            u.status = UploadStatus::Processed;
            u.processed_at = Some(Utc::now());
        })?;

        Ok(ProcessStats {
            rows_processed,
            rows_inserted,
        })
    }

    fn cleaned_dataset(
        &self,
        upload: &Upload,
        mapping: Option<&BTreeMap<String, String>>,
        today: NaiveDate,
    ) -> Result<Dataset> {
        let raw = self.bytes.read(upload.id)?;
        let dataset = reader::read_dataset(&raw, &upload.filename)?;
        let dataset = clean_dataset(dataset, today);
        let dataset = match mapping.or(upload.column_mapping.as_ref()) {
            Some(mapping) => transform::apply_mapping(dataset, mapping),
            None => dataset,
        };
        Ok(transform::fill_required_columns(dataset, today))
    }
}

/// The cleaning sequence shared by process and preview: canonical names,
/// lenient type conversion, then type-appropriate null filling.
fn clean_dataset(dataset: Dataset, today: NaiveDate) -> Dataset {
    let dataset = normalize::normalize_columns(dataset);
    let dataset = infer::convert_types(dataset);
    transform::fill_missing_values(dataset, today)
}

/// One [`SalesRecord`] per surviving row. Cells that still fail to coerce
/// fall back to the column's default rather than aborting the run.
fn materialize_records(dataset: &Dataset, upload_id: Uuid, today: NaiveDate) -> Vec<SalesRecord> {
    let cell = |name: &str, row: usize| -> Option<Value> {
        dataset
            .column(name)
            .and_then(|c| c.values.get(row))
            .cloned()
            .flatten()
    };
    let number = |name: &str, row: usize| -> f64 {
        cell(name, row)
            .as_ref()
            .and_then(coerce_numeric)
            .unwrap_or(0.0)
    };

    (0..dataset.row_count())
        .map(|row| SalesRecord {
            upload_id,
            date: cell("date", row)
                .as_ref()
                .and_then(coerce_timestamp)
                .unwrap_or_else(|| today.and_time(NaiveTime::MIN)),
            sku_id: cell("sku_id", row)
                .map(|v| v.as_display())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            sales_quantity: number("sales_quantity", row),
            unit_price: number("unit_price", row),
            sales_revenue: number("sales_revenue", row),
            stock_level: number("stock_level", row) as i64,
            category: cell("category", row)
                .map(|v| v.as_display())
                .unwrap_or_default(),
        })
        .collect()
}
