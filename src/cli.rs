use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Ingest and normalize tabular sales files", long_about = None)]
pub struct Cli {
    /// Root directory for blobs, upload records, and sales records
    #[arg(long = "store", global = true, default_value = ".sales-ingest")]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a tabular file and report its detected schema and quality issues
    Upload(UploadArgs),
    /// Re-run schema detection and validation for an existing upload
    Detect(DetectArgs),
    /// Store a confirmed column mapping on an upload
    Mapping(MappingArgs),
    /// Show the cleaned, mapped, default-filled rows without committing them
    Preview(PreviewArgs),
    /// Process an upload into normalized sales records
    Process(ProcessArgs),
    /// List registered uploads, most recent first
    Uploads(UploadsArgs),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Input file (.csv, .txt, .xlsx, .xls)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Upload identifier returned by `upload`
    pub id: String,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Upload identifier returned by `upload`
    pub id: String,
    /// Column renames of the form `source=target`
    #[arg(short = 'm', long = "map", action = clap::ArgAction::Append, required = true)]
    pub mappings: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Upload identifier returned by `upload`
    pub id: String,
    /// Column renames of the form `source=target` (overrides the stored mapping)
    #[arg(short = 'm', long = "map", action = clap::ArgAction::Append)]
    pub mappings: Vec<String>,
    /// Maximum number of rows to display
    #[arg(long, default_value_t = crate::pipeline::DEFAULT_PREVIEW_ROWS)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Upload identifier returned by `upload`
    pub id: String,
    /// Column renames of the form `source=target` (overrides the stored mapping)
    #[arg(short = 'm', long = "map", action = clap::ArgAction::Append)]
    pub mappings: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UploadsArgs {
    /// Maximum number of uploads to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// Parses repeated `source=target` pairs into a rename table.
pub fn parse_mapping_pairs(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut mapping = BTreeMap::new();
    for pair in pairs {
        let (source, target) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid mapping '{pair}', expected source=target"))?;
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            anyhow::bail!("Invalid mapping '{pair}', expected source=target");
        }
        mapping.insert(source.to_string(), target.to_string());
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mapping_pairs_builds_rename_table() {
        let mapping =
            parse_mapping_pairs(&["order_date=date".to_string(), " qty = sales_quantity ".into()])
                .unwrap();
        assert_eq!(mapping.get("order_date").map(String::as_str), Some("date"));
        assert_eq!(mapping.get("qty").map(String::as_str), Some("sales_quantity"));
    }

    #[test]
    fn parse_mapping_pairs_rejects_malformed_input() {
        assert!(parse_mapping_pairs(&["no-equals".to_string()]).is_err());
        assert!(parse_mapping_pairs(&["=target".to_string()]).is_err());
    }
}
