use std::collections::BTreeMap;

use sales_ingest::{
    error::IngestError,
    model::UploadStatus,
    pipeline::ProcessingPipeline,
    store::{FsStore, RecordStore, UploadStore},
    validate::IssueKind,
};
use tempfile::{TempDir, tempdir};

const SALES_CSV: &str = "\
 Order Date ,SKU,Quantity Sold,Unit-Price
2024-01-05,A-100,3,9.99
2024-02-10,A-100,1,9.99
2024-03-15,B-200,5,4.50
";

fn open_store() -> (TempDir, FsStore) {
    let dir = tempdir().expect("temp dir");
    let store = FsStore::open(dir.path().join("store")).expect("open store");
    (dir, store)
}

fn rename_table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn ingest_rejects_disallowed_extensions_before_storing() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let err = pipeline.ingest("report.pdf", b"whatever").unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn ingest_enforces_the_size_cap() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let oversized = vec![b'x'; (sales_ingest::pipeline::MAX_UPLOAD_BYTES + 1) as usize];
    let err = pipeline.ingest("big.csv", &oversized).unwrap_err();
    assert!(matches!(err, IngestError::FileTooLarge { .. }));
}

#[test]
fn detect_profiles_and_persists_without_changing_status() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    let (schema, report) = pipeline.detect(upload.id).unwrap();

    let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["order_date", "sku", "quantity_sold", "unit_price"]
    );
    assert_eq!(schema.suggested_date_column.as_deref(), Some("order_date"));
    assert_eq!(schema.suggested_sku_column.as_deref(), Some("sku"));
    assert_eq!(schema.row_count, 3);
    assert!(report.is_valid);

    let stored = store.get(upload.id).unwrap();
    assert_eq!(stored.status, UploadStatus::Uploaded);
    assert_eq!(stored.row_count, Some(3));
    assert_eq!(stored.column_count, Some(4));
    assert!(stored.detected_schema.is_some());
    assert!(stored.validation_report.is_some());
}

#[test]
fn detect_flags_an_empty_file_without_failing() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("empty.csv", b"a,b\n").unwrap();
    let (schema, report) = pipeline.detect(upload.id).unwrap();

    assert_eq!(schema.row_count, 0);
    assert!(!report.is_valid);
    assert!(
        report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::EmptyFile)
    );
}

#[test]
fn process_commits_records_and_reaches_processed() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    let mapping = rename_table(&[
        ("order_date", "date"),
        ("sku", "sku_id"),
        ("quantity_sold", "sales_quantity"),
    ]);
    let stats = pipeline.process(upload.id, Some(&mapping)).unwrap();

    assert_eq!(stats.rows_processed, 3);
    assert_eq!(stats.rows_inserted, 3);

    let stored = store.get(upload.id).unwrap();
    assert_eq!(stored.status, UploadStatus::Processed);
    assert!(stored.processed_at.is_some());
    assert!(stored.error_message.is_none());

    let records = store.for_upload(upload.id).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sku_id, "A-100");
    assert_eq!(records[0].sales_quantity, 3.0);
    assert_eq!(records[0].unit_price, 9.99);
    assert_eq!(records[2].sku_id, "B-200");
    // Revenue never appeared in the source file, so the filler zeroed it.
    assert_eq!(records[0].sales_revenue, 0.0);
    assert_eq!(records[0].category, "");
}

#[test]
fn second_process_fails_with_already_processed_and_mutates_nothing() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    pipeline.process(upload.id, None).unwrap();
    let before = store.get(upload.id).unwrap();

    let err = pipeline.process(upload.id, None).unwrap_err();
    assert!(matches!(err, IngestError::AlreadyProcessed { .. }));

    let after = store.get(upload.id).unwrap();
    assert_eq!(after, before);
    assert_eq!(store.for_upload(upload.id).unwrap().len(), 3);
}

#[test]
fn failed_run_lands_on_error_with_the_message_captured() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    // Ragged rows parse as a decode failure once processing starts.
    let upload = pipeline.ingest("bad.csv", b"a,b\n1,2,3\n").unwrap();
    let err = pipeline.process(upload.id, None).unwrap_err();
    assert!(matches!(err, IngestError::Decode { .. }));

    let stored = store.get(upload.id).unwrap();
    assert_eq!(stored.status, UploadStatus::Error);
    assert_eq!(stored.error_message.as_deref(), Some(err.to_string().as_str()));
}

#[test]
fn zero_row_file_aborts_before_inserting() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("empty.csv", b"a,b\n").unwrap();
    let err = pipeline.process(upload.id, None).unwrap_err();
    assert!(matches!(err, IngestError::Processing { .. }));

    let stored = store.get(upload.id).unwrap();
    assert_eq!(stored.status, UploadStatus::Error);
    assert!(store.for_upload(upload.id).unwrap().is_empty());
}

#[test]
fn upload_not_found_is_reported_as_such() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let err = pipeline.process(uuid::Uuid::new_v4(), None).unwrap_err();
    assert!(matches!(err, IngestError::UploadNotFound { .. }));
}

#[test]
fn preview_is_idempotent_and_read_only() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    let first = pipeline.preview(upload.id, None, 20).unwrap();
    let second = pipeline.preview(upload.id, None, 20).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_rows, 3);

    let stored = store.get(upload.id).unwrap();
    assert_eq!(stored.status, UploadStatus::Uploaded);
    assert!(store.for_upload(upload.id).unwrap().is_empty());
}

#[test]
fn preview_caps_rows_and_reports_final_columns() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    let mapping = rename_table(&[("order_date", "date"), ("sku", "sku_id")]);
    let payload = pipeline.preview(upload.id, Some(&mapping), 2).unwrap();

    assert_eq!(payload.preview.len(), 2);
    assert_eq!(payload.total_rows, 3);
    assert!(payload.columns.contains(&"date".to_string()));
    assert!(payload.columns.contains(&"sales_revenue".to_string()));
    assert_eq!(
        payload.preview[0].get("sku_id"),
        Some(&serde_json::Value::String("A-100".to_string()))
    );
}

#[test]
fn stored_mapping_is_used_when_none_is_passed() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let upload = pipeline.ingest("sales.csv", SALES_CSV.as_bytes()).unwrap();
    pipeline
        .set_mapping(upload.id, rename_table(&[("sku", "sku_id")]))
        .unwrap();
    pipeline.process(upload.id, None).unwrap();

    let records = store.for_upload(upload.id).unwrap();
    assert_eq!(records[0].sku_id, "A-100");
}

#[test]
fn complete_well_typed_dataset_round_trips_cleanly() {
    let (_dir, store) = open_store();
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    let csv = "\
date,sku_id,sales_quantity,unit_price,sales_revenue,stock_level,category
2024-01-05,A-100,3,9.99,29.97,12,toys
2024-03-15,B-200,5,4.50,22.50,40,games
";
    let upload = pipeline.ingest("clean.csv", csv.as_bytes()).unwrap();
    let (_, report) = pipeline.detect(upload.id).unwrap();
    assert!(report.is_valid);

    // Every required field already exists, so the filler adds nothing.
    let payload = pipeline.preview(upload.id, None, 20).unwrap();
    assert_eq!(payload.columns.len(), 7);

    let stats = pipeline.process(upload.id, None).unwrap();
    assert_eq!(stats.rows_inserted, 2);
    let records = store.for_upload(upload.id).unwrap();
    assert_eq!(records[1].sales_revenue, 22.50);
    assert_eq!(records[1].stock_level, 40);
    assert_eq!(records[1].category, "games");
}
