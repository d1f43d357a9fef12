pub mod cli;
pub mod data;
pub mod error;
pub mod infer;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod reader;
pub mod store;
pub mod table;
pub mod transform;
pub mod validate;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};
use uuid::Uuid;

use crate::{
    cli::{Cli, Commands, parse_mapping_pairs},
    pipeline::ProcessingPipeline,
    store::{FsStore, UploadStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let store = FsStore::open(&cli.store)
        .with_context(|| format!("Opening store at {:?}", cli.store))?;
    let pipeline = ProcessingPipeline::new(&store, &store, &store);

    match cli.command {
        Commands::Upload(args) => handle_upload(&pipeline, &args),
        Commands::Detect(args) => handle_detect(&pipeline, &args),
        Commands::Mapping(args) => handle_mapping(&pipeline, &args),
        Commands::Preview(args) => handle_preview(&pipeline, &args),
        Commands::Process(args) => handle_process(&pipeline, &args),
        Commands::Uploads(args) => handle_uploads(&store, &args),
    }
}

fn parse_upload_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("Invalid upload id '{raw}'"))
}

fn handle_upload(pipeline: &ProcessingPipeline<'_>, args: &cli::UploadArgs) -> Result<()> {
    let filename = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Input path {:?} has no filename", args.input))?;
    let data =
        fs::read(&args.input).with_context(|| format!("Reading input file {:?}", args.input))?;

    let upload = pipeline.ingest(filename, &data)?;
    let (schema, validation) = pipeline.detect(upload.id)?;
    info!(
        "upload {} registered from '{}' ({})",
        upload.id, filename, validation.summary
    );

    let payload = serde_json::json!({
        "upload_id": upload.id,
        "filename": upload.filename,
        "status": "uploaded",
        "row_count": schema.row_count,
        "column_count": schema.column_count,
        "schema": schema,
        "validation": validation,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn handle_detect(pipeline: &ProcessingPipeline<'_>, args: &cli::DetectArgs) -> Result<()> {
    let id = parse_upload_id(&args.id)?;
    let (schema, validation) = pipeline.detect(id)?;
    let payload = serde_json::json!({
        "upload_id": id,
        "schema": schema,
        "validation": validation,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn handle_mapping(pipeline: &ProcessingPipeline<'_>, args: &cli::MappingArgs) -> Result<()> {
    let id = parse_upload_id(&args.id)?;
    let mapping = parse_mapping_pairs(&args.mappings)?;
    let upload = pipeline.set_mapping(id, mapping)?;
    info!("stored column mapping for upload {id}");
    let payload = serde_json::json!({
        "upload_id": upload.id,
        "mapping": upload.column_mapping,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn handle_preview(pipeline: &ProcessingPipeline<'_>, args: &cli::PreviewArgs) -> Result<()> {
    let id = parse_upload_id(&args.id)?;
    let mapping = if args.mappings.is_empty() {
        None
    } else {
        Some(parse_mapping_pairs(&args.mappings)?)
    };
    let payload = pipeline.preview(id, mapping.as_ref(), args.rows)?;

    let rows: Vec<Vec<String>> = payload
        .preview
        .iter()
        .map(|record| {
            payload
                .columns
                .iter()
                .map(|column| match record.get(column) {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();
    table::print_table(&payload.columns, &rows);
    info!(
        "previewed {} of {} row(s) for upload {id}",
        rows.len(),
        payload.total_rows
    );
    Ok(())
}

fn handle_process(pipeline: &ProcessingPipeline<'_>, args: &cli::ProcessArgs) -> Result<()> {
    let id = parse_upload_id(&args.id)?;
    let mapping = if args.mappings.is_empty() {
        None
    } else {
        Some(parse_mapping_pairs(&args.mappings)?)
    };
    let stats = pipeline.process(id, mapping.as_ref())?;
    let payload = serde_json::json!({
        "upload_id": id,
        "status": "processed",
        "rows_processed": stats.rows_processed,
        "rows_inserted": stats.rows_inserted,
        "message": "Data processed successfully",
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn handle_uploads(store: &FsStore, args: &cli::UploadsArgs) -> Result<()> {
    let uploads = store.list()?;
    let headers: Vec<String> = ["id", "filename", "status", "rows", "uploaded_at"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows: Vec<Vec<String>> = uploads
        .iter()
        .take(args.limit)
        .map(|upload| {
            vec![
                upload.id.to_string(),
                upload.filename.clone(),
                upload.status.to_string(),
                upload
                    .row_count
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
                upload.uploaded_at.to_rfc3339(),
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
    info!("{} upload(s) in store", uploads.len());
    Ok(())
}
