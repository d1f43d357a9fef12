//! Storage collaborators.
//!
//! The pipeline never touches ambient paths: it is handed references to a
//! byte store, an upload record store, and a sales-record store. `FsStore`
//! implements all three against a caller-chosen root directory, which keeps
//! the CLI honest and the tests on temp dirs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{
    error::{IngestError, Result},
    model::{SalesRecord, Upload},
};

pub trait ByteStore {
    fn save(&self, id: Uuid, bytes: &[u8]) -> Result<()>;
    fn read(&self, id: Uuid) -> Result<Vec<u8>>;
    fn delete(&self, id: Uuid) -> Result<()>;
}

pub trait UploadStore {
    fn create(&self, upload: &Upload) -> Result<()>;
    fn get(&self, id: Uuid) -> Result<Upload>;
    /// Applies a partial mutation to the stored record without clobbering
    /// unrelated fields, returning the updated record.
    fn update(&self, id: Uuid, apply: &dyn Fn(&mut Upload)) -> Result<Upload>;
    /// All uploads, most recent first.
    fn list(&self) -> Result<Vec<Upload>>;
}

pub trait RecordStore {
    /// Bulk-inserts records for one upload; all-or-nothing per call.
    fn insert(&self, records: &[SalesRecord]) -> Result<usize>;
    fn for_upload(&self, id: Uuid) -> Result<Vec<SalesRecord>>;
}

/// Filesystem-backed store rooted at an injected directory: raw blobs under
/// `blobs/`, upload records as JSON under `uploads/`, sales records as JSON
/// lines under `records/`.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["blobs", "uploads", "records"] {
            fs::create_dir_all(root.join(sub))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: Uuid) -> PathBuf {
        self.root.join("blobs").join(format!("{id}.bin"))
    }

    fn upload_path(&self, id: Uuid) -> PathBuf {
        self.root.join("uploads").join(format!("{id}.json"))
    }

    fn records_path(&self, id: Uuid) -> PathBuf {
        self.root.join("records").join(format!("{id}.jsonl"))
    }

    fn read_upload(&self, id: Uuid) -> Result<Upload> {
        let path = self.upload_path(id);
        if !path.exists() {
            return Err(IngestError::UploadNotFound { id });
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write_upload(&self, upload: &Upload) -> Result<()> {
        let file = File::create(self.upload_path(upload.id))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, upload)?;
        writer.flush()?;
        Ok(())
    }
}

impl ByteStore for FsStore {
    fn save(&self, id: Uuid, bytes: &[u8]) -> Result<()> {
        fs::write(self.blob_path(id), bytes)?;
        Ok(())
    }

    fn read(&self, id: Uuid) -> Result<Vec<u8>> {
        let path = self.blob_path(id);
        if !path.exists() {
            return Err(IngestError::UploadNotFound { id });
        }
        Ok(fs::read(path)?)
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.blob_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl UploadStore for FsStore {
    fn create(&self, upload: &Upload) -> Result<()> {
        self.write_upload(upload)
    }

    fn get(&self, id: Uuid) -> Result<Upload> {
        self.read_upload(id)
    }

    fn update(&self, id: Uuid, apply: &dyn Fn(&mut Upload)) -> Result<Upload> {
        let mut upload = self.read_upload(id)?;
        apply(&mut upload);
        self.write_upload(&upload)?;
        Ok(upload)
    }

    fn list(&self) -> Result<Vec<Upload>> {
        let mut uploads = Vec::new();
        for entry in fs::read_dir(self.root.join("uploads"))? {
            let entry = entry?;
            if entry.path().extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let file = File::open(entry.path())?;
            uploads.push(serde_json::from_reader::<_, Upload>(BufReader::new(file))?);
        }
        uploads.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(uploads)
    }
}

impl RecordStore for FsStore {
    fn insert(&self, records: &[SalesRecord]) -> Result<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        // Serialize every line before touching the file so a bad record
        // cannot leave a partial batch behind.
        let mut lines = Vec::with_capacity(records.len());
        for record in records {
            lines.push(serde_json::to_string(record)?);
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.records_path(first.upload_id))?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(records.len())
    }

    fn for_upload(&self, id: Uuid) -> Result<Vec<SalesRecord>> {
        let path = self.records_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_record(upload_id: Uuid) -> SalesRecord {
        SalesRecord {
            upload_id,
            date: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            sku_id: "A-1".to_string(),
            sales_quantity: 2.0,
            unit_price: 9.99,
            sales_revenue: 19.98,
            stock_level: 14,
            category: "toys".to_string(),
        }
    }

    #[test]
    fn bytes_round_trip_and_delete() {
        let dir = tempdir().expect("temp dir");
        let store = FsStore::open(dir.path()).expect("open store");
        let id = Uuid::new_v4();
        store.save(id, b"a,b\n1,2\n").unwrap();
        assert_eq!(ByteStore::read(&store, id).unwrap(), b"a,b\n1,2\n");
        store.delete(id).unwrap();
        assert!(matches!(
            ByteStore::read(&store, id),
            Err(IngestError::UploadNotFound { .. })
        ));
    }

    #[test]
    fn update_preserves_unrelated_fields() {
        let dir = tempdir().expect("temp dir");
        let store = FsStore::open(dir.path()).expect("open store");
        let id = Uuid::new_v4();
        let mut upload = Upload::new(id, "sales.csv", 42);
        upload.row_count = Some(7);
        store.create(&upload).unwrap();

        store
            .update(id, &|u| u.error_message = Some("boom".to_string()))
            .unwrap();

        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.row_count, Some(7));
        assert_eq!(fetched.filename, "sales.csv");
        assert_eq!(fetched.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn missing_upload_is_a_typed_error() {
        let dir = tempdir().expect("temp dir");
        let store = FsStore::open(dir.path()).expect("open store");
        assert!(matches!(
            store.get(Uuid::new_v4()),
            Err(IngestError::UploadNotFound { .. })
        ));
    }

    #[test]
    fn records_round_trip_per_upload() {
        let dir = tempdir().expect("temp dir");
        let store = FsStore::open(dir.path()).expect("open store");
        let id = Uuid::new_v4();
        let inserted = store
            .insert(&[sample_record(id), sample_record(id)])
            .unwrap();
        assert_eq!(inserted, 2);
        let fetched = store.for_upload(id).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].sku_id, "A-1");
        assert!(store.for_upload(Uuid::new_v4()).unwrap().is_empty());
    }
}
