//! Incremental CSV + JSON export
//!
//! After every successful [`RecordSink::append`] both output files hold the
//! same complete set of records. Each append renders both files to
//! temporaries, syncs them, and renames them over the previous versions, so
//! a reader never sees a half-written row or a truncated JSON array.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{HarvestError, Result};
use crate::types::Record;

/// CSV column order
pub const CSV_COLUMNS: [&str; 7] = [
    "sourceUrl",
    "title",
    "description",
    "amountRaised",
    "daysRunning",
    "imageUrls",
    "completeness",
];

/// Separator for `imageUrls` inside one CSV cell
pub const IMAGE_URL_DELIMITER: &str = ";";

/// Destination for finalized records
pub trait RecordSink {
    /// Persist one finalized record.
    fn append(&mut self, record: Record) -> Result<()>;
}

impl RecordSink for Vec<Record> {
    fn append(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// File-backed sink writing a CSV and a JSON array side by side
pub struct ExportSink {
    csv_path: PathBuf,
    json_path: PathBuf,
    records: Vec<Record>,
    written: bool,
}

impl ExportSink {
    /// Create (or truncate) both outputs, leaving a header-only CSV and an
    /// empty JSON array.
    pub fn create(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Result<Self> {
        let mut sink = Self::deferred(csv_path, json_path)?;
        sink.finish()?;
        Ok(sink)
    }

    /// Prepare both outputs without touching existing files.
    ///
    /// Previous outputs are replaced by the first [`RecordSink::append`], or
    /// by [`ExportSink::finish`] if no record ever arrives. A run that aborts
    /// before either leaves them as they were.
    pub fn deferred(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Result<Self> {
        let sink = Self {
            csv_path: csv_path.into(),
            json_path: json_path.into(),
            records: Vec::new(),
            written: false,
        };
        for path in [&sink.csv_path, &sink.json_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(sink)
    }

    /// Make sure both outputs exist, writing a header-only CSV and an empty
    /// JSON array if nothing was appended yet.
    pub fn finish(&mut self) -> Result<()> {
        if !self.written {
            self.flush()?;
            self.written = true;
        }
        Ok(())
    }

    /// Records written so far, in export order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    fn flush(&self) -> Result<()> {
        let csv_tmp = temp_path(&self.csv_path);
        let json_tmp = temp_path(&self.json_path);

        write_synced(&csv_tmp, &render_csv(&self.records)?)?;
        write_synced(&json_tmp, &render_json(&self.records)?)?;

        if let Err(e) = fs::rename(&json_tmp, &self.json_path) {
            let _ = fs::remove_file(&json_tmp);
            let _ = fs::remove_file(&csv_tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&csv_tmp, &self.csv_path) {
            let _ = fs::remove_file(&csv_tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Rewrite the JSON from `records` after a failed flush may have
    /// renamed it ahead of the CSV.
    fn roll_back_json(&self) {
        let json_tmp = temp_path(&self.json_path);
        let restored = render_json(&self.records)
            .and_then(|bytes| write_synced(&json_tmp, &bytes))
            .and_then(|()| fs::rename(&json_tmp, &self.json_path).map_err(HarvestError::from));
        if let Err(e) = restored {
            tracing::warn!(path = %self.json_path.display(), error = %e, "failed to roll back JSON export");
        }
    }
}

impl RecordSink for ExportSink {
    fn append(&mut self, record: Record) -> Result<()> {
        self.records.push(record);
        if let Err(e) = self.flush() {
            self.records.pop();
            self.roll_back_json();
            return Err(e);
        }
        self.written = true;
        Ok(())
    }
}

/// Render records as CSV with a header row.
pub fn render_csv(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.write_record(csv_row(record))?;
    }
    writer
        .into_inner()
        .map_err(|e| HarvestError::Io(e.into_error()))
}

/// Render records as a pretty-printed JSON array.
pub fn render_json(records: &[Record]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn csv_row(record: &Record) -> [String; 7] {
    [
        record.source_url.clone(),
        record.title.clone().unwrap_or_default(),
        record.description.clone().unwrap_or_default(),
        record.amount_raised.map(|v| v.to_string()).unwrap_or_default(),
        record.days_running.map(|v| v.to_string()).unwrap_or_default(),
        record.image_urls.join(IMAGE_URL_DELIMITER),
        record.completeness.as_str().to_string(),
    ]
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Completeness;

    fn record(slug: &str) -> Record {
        let mut record = Record::stub(format!("https://www.gofundme.com/f/{slug}"));
        record.title = Some(format!("Help {slug}"));
        record
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    fn read_json(path: &Path) -> Vec<Record> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_create_writes_empty_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ExportSink::create(dir.path().join("out.csv"), dir.path().join("out.json")).unwrap();

        let csv = fs::read_to_string(sink.csv_path()).unwrap();
        assert_eq!(
            csv.trim_end(),
            "sourceUrl,title,description,amountRaised,daysRunning,imageUrls,completeness"
        );
        assert!(read_json(sink.json_path()).is_empty());
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("runs").join("today");
        let sink = ExportSink::create(nested.join("a.csv"), nested.join("a.json")).unwrap();
        assert!(sink.csv_path().exists());
        assert!(sink.json_path().exists());
    }

    #[test]
    fn test_every_append_leaves_both_files_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            ExportSink::create(dir.path().join("out.csv"), dir.path().join("out.json")).unwrap();

        for (i, slug) in ["rex", "luna", "milo"].iter().enumerate() {
            sink.append(record(slug)).unwrap();
            assert_eq!(read_csv(sink.csv_path()).len(), i + 1);
            assert_eq!(read_json(sink.json_path()).len(), i + 1);
        }
        assert!(!temp_path(sink.csv_path()).exists());
        assert!(!temp_path(sink.json_path()).exists());
    }

    #[test]
    fn test_csv_row_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            ExportSink::create(dir.path().join("out.csv"), dir.path().join("out.json")).unwrap();

        let mut full = record("rex");
        full.description = Some("Surgery, rehab, and \"lots\" of treats".to_string());
        full.amount_raised = Some(1234.0);
        full.days_running = Some(12);
        full.image_urls = vec![
            "https://img.test/a.jpg".to_string(),
            "https://img.test/b.jpg".to_string(),
        ];
        full.completeness = Completeness::Full;
        sink.append(full).unwrap();
        sink.append(Record::stub("https://www.gofundme.com/f/bare")).unwrap();

        let rows = read_csv(sink.csv_path());
        assert_eq!(
            rows[0],
            vec![
                "https://www.gofundme.com/f/rex",
                "Help rex",
                "Surgery, rehab, and \"lots\" of treats",
                "1234",
                "12",
                "https://img.test/a.jpg;https://img.test/b.jpg",
                "full",
            ]
        );
        assert_eq!(
            rows[1],
            vec!["https://www.gofundme.com/f/bare", "", "", "", "", "", "partial"]
        );
    }

    #[test]
    fn test_json_output_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            ExportSink::create(dir.path().join("out.csv"), dir.path().join("out.json")).unwrap();

        let mut rec = record("rex");
        rec.amount_raised = Some(99.5);
        rec.image_urls = vec!["https://img.test/a.jpg".to_string()];
        sink.append(rec).unwrap();
        sink.append(Record::stub("https://www.gofundme.com/f/bare")).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(sink.json_path()).unwrap()).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["amountRaised"], 99.5);
        assert_eq!(items[0]["imageUrls"], serde_json::json!(["https://img.test/a.jpg"]));
        assert!(items[1]["amountRaised"].is_null());
        assert!(items[1]["daysRunning"].is_null());
        assert_eq!(items[1]["imageUrls"], serde_json::json!([]));
    }

    #[test]
    fn test_create_truncates_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.json");

        let mut first = ExportSink::create(&csv_path, &json_path).unwrap();
        first.append(record("rex")).unwrap();

        let second = ExportSink::create(&csv_path, &json_path).unwrap();
        assert!(second.records().is_empty());
        assert!(read_csv(&csv_path).is_empty());
        assert!(read_json(&json_path).is_empty());
    }

    #[test]
    fn test_deferred_sink_keeps_previous_output_until_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.json");
        let mut previous = ExportSink::create(&csv_path, &json_path).unwrap();
        previous.append(record("rex")).unwrap();

        let mut sink = ExportSink::deferred(&csv_path, &json_path).unwrap();
        assert_eq!(read_csv(&csv_path).len(), 1);
        assert_eq!(read_json(&json_path).len(), 1);

        sink.append(record("luna")).unwrap();
        let json = read_json(&json_path);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0].source_url, "https://www.gofundme.com/f/luna");
        assert_eq!(read_csv(&csv_path).len(), 1);
    }

    #[test]
    fn test_finish_without_records_writes_empty_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.json");

        let mut sink = ExportSink::deferred(&csv_path, &json_path).unwrap();
        assert!(!csv_path.exists());
        assert!(!json_path.exists());

        sink.finish().unwrap();
        assert!(read_csv(&csv_path).is_empty());
        assert!(read_json(&json_path).is_empty());
    }

    #[test]
    fn test_finish_after_append_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            ExportSink::deferred(dir.path().join("out.csv"), dir.path().join("out.json")).unwrap();
        sink.append(record("rex")).unwrap();
        sink.finish().unwrap();
        assert_eq!(read_json(sink.json_path()).len(), 1);
    }

    #[test]
    fn test_vec_sink_collects_records() {
        let mut sink: Vec<Record> = Vec::new();
        RecordSink::append(&mut sink, record("rex")).unwrap();
        RecordSink::append(&mut sink, record("luna")).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1].source_url, "https://www.gofundme.com/f/luna");
    }

    #[test]
    fn test_failed_csv_rename_keeps_files_in_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.json");
        let mut sink = ExportSink::create(&csv_path, &json_path).unwrap();
        sink.append(record("rex")).unwrap();

        // A non-empty directory in place of the CSV makes its rename fail
        // after the JSON has already been replaced.
        fs::remove_file(&csv_path).unwrap();
        fs::create_dir(&csv_path).unwrap();
        fs::write(csv_path.join("keep"), b"x").unwrap();

        assert!(sink.append(record("luna")).is_err());
        assert_eq!(sink.records().len(), 1);
        let json = read_json(&json_path);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0].source_url, "https://www.gofundme.com/f/rex");
        assert!(!temp_path(&csv_path).exists());
        assert!(!temp_path(&json_path).exists());
    }
}
