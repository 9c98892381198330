//! Persistence and listing of generated report artifacts.
//!
//! Everything lives as flat files under one output directory: timestamped
//! JSON snapshots, CSV exports (UTF-8 with BOM), HTML reports, and weekly
//! Markdown files under a `weekly_reports/` subdirectory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::classify::FunctionRecord;
use crate::duplicate::DuplicateGroup;
use crate::error::{CodeGaugeError, Result};
use crate::settings::Settings;

/// Metadata for one generated artifact file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportFile {
    /// File name inside the output directory.
    pub name: String,
    /// Report family (`uncommented`, `duplicate`, `weekly`).
    pub kind: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Last-modified timestamp, RFC 3339.
    pub modified: String,
}

/// File-backed store for analysis artifacts.
#[derive(Debug, Clone)]
pub struct OutputStore {
    output_dir: PathBuf,
    pretty_print: bool,
}

impl OutputStore {
    /// Build a store rooted at the given directory.
    pub fn new(output_dir: impl Into<PathBuf>, pretty_print: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            pretty_print,
        }
    }

    /// Build a store from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.output.output_dir.clone(),
            settings.output.pretty_print,
        )
    }

    /// Root output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding weekly Markdown reports.
    pub fn weekly_dir(&self) -> PathBuf {
        self.output_dir.join("weekly_reports")
    }

    /// Create the directory tree if it is missing.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(self.weekly_dir())?;
        Ok(())
    }

    /// Timestamp component used in artifact file names.
    pub fn timestamp() -> String {
        Local::now().format("%Y%m%d_%H%M%S").to_string()
    }

    /// Persist a JSON snapshot.
    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let contents = if self.pretty_print {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        self.save_text(file_name, &contents)
    }

    /// Persist a text artifact under the output directory.
    pub fn save_text(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents)
            .map_err(|err| CodeGaugeError::Render(format!("write {}: {err}", path.display())))?;
        log::info!("saved {}", path.display());
        Ok(path)
    }

    /// Persist a weekly Markdown report.
    pub fn save_weekly(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.weekly_dir().join(file_name);
        fs::write(&path, contents)
            .map_err(|err| CodeGaugeError::Render(format!("write {}: {err}", path.display())))?;
        log::info!("saved {}", path.display());
        Ok(path)
    }

    /// Export function records as CSV, UTF-8 with BOM. Columns are the
    /// sorted union of field names across all records, after `project_id`.
    pub fn save_records_csv(
        &self,
        file_name: &str,
        records: &[FunctionRecord],
    ) -> Result<PathBuf> {
        let mut field_names = std::collections::BTreeSet::new();
        for record in records {
            field_names.extend(record.fields.keys().cloned());
        }
        let mut columns = vec!["project_id".to_string()];
        columns.extend(field_names);

        let mut buffer: Vec<u8> = vec![0xEF, 0xBB, 0xBF];
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            writer.write_record(&columns)?;
            for record in records {
                let mut row = Vec::with_capacity(columns.len());
                row.push(record.project_id.clone());
                for column in &columns[1..] {
                    row.push(cell_text(record.fields.get(column)));
                }
                writer.write_record(&row)?;
            }
            writer.flush().map_err(|err| CodeGaugeError::Render(err.to_string()))?;
        }

        let path = self.output_dir.join(file_name);
        fs::write(&path, buffer)
            .map_err(|err| CodeGaugeError::Render(format!("write {}: {err}", path.display())))?;
        log::info!("saved {} ({} rows)", path.display(), records.len());
        Ok(path)
    }

    /// Export duplicate groups as CSV, UTF-8 with BOM.
    pub fn save_groups_csv(&self, file_name: &str, groups: &[DuplicateGroup]) -> Result<PathBuf> {
        let mut buffer: Vec<u8> = vec![0xEF, 0xBB, 0xBF];
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            writer.write_record([
                "project_id",
                "groupName",
                "numFunctions",
                "numFiles",
                "maxComplexity",
                "avgLines",
                "language",
                "filePaths",
                "emails",
            ])?;
            for group in groups {
                writer.write_record(&[
                    group.project_id.clone(),
                    group.group_name.clone(),
                    group.num_functions.to_string(),
                    group.num_files.to_string(),
                    group.max_complexity.to_string(),
                    group.avg_lines.to_string(),
                    group.language.clone(),
                    group.file_paths.join(";"),
                    group.emails.join(";"),
                ])?;
            }
            writer.flush().map_err(|err| CodeGaugeError::Render(err.to_string()))?;
        }

        let path = self.output_dir.join(file_name);
        fs::write(&path, buffer)
            .map_err(|err| CodeGaugeError::Render(format!("write {}: {err}", path.display())))?;
        log::info!("saved {} ({} groups)", path.display(), groups.len());
        Ok(path)
    }

    /// List generated HTML reports, newest first, optionally filtered by
    /// kind (`uncommented` or `duplicate`).
    pub fn list_reports(&self, kind: Option<&str>) -> Result<Vec<ReportFile>> {
        let mut reports = Vec::new();
        for entry in read_dir_entries(&self.output_dir)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.ends_with(".html") {
                continue;
            }
            let file_kind = if name.starts_with("uncommented_functions_report") {
                "uncommented"
            } else if name.starts_with("duplicate_functions_report") {
                "duplicate"
            } else {
                continue;
            };
            if kind.is_some_and(|wanted| wanted != file_kind && wanted != "all") {
                continue;
            }
            if let Some(report) = report_file(&entry.path(), &name, file_kind) {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(reports)
    }

    /// List weekly Markdown reports, newest first, optionally filtered by
    /// entity id.
    pub fn list_weekly(&self, entity_id: Option<&str>) -> Result<Vec<ReportFile>> {
        let weekly_dir = self.weekly_dir();
        if !weekly_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for entry in read_dir_entries(&weekly_dir)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with("weekly_report_") || !name.ends_with(".md") {
                continue;
            }
            if let Some(entity) = entity_id {
                if !name.starts_with(&format!("weekly_report_{entity}_")) {
                    continue;
                }
            }
            if let Some(report) = report_file(&entry.path(), &name, "weekly") {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(reports)
    }

    /// Most recently modified classified snapshot, if any.
    pub fn latest_classified(&self) -> Option<PathBuf> {
        let entries = read_dir_entries(&self.output_dir).ok()?;
        entries
            .into_iter()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| {
                        name.starts_with("classified_results_") && name.ends_with(".json")
                    })
            })
            .max_by_key(|entry| {
                entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .ok()
            })
            .map(|entry| entry.path())
    }

    /// Resolve a report file name to its path, rejecting traversal.
    pub fn resolve_report(&self, file_name: &str) -> Result<PathBuf> {
        checked_name(file_name)?;
        Ok(self.output_dir.join(file_name))
    }

    /// Resolve a weekly report file name to its path, rejecting traversal.
    pub fn resolve_weekly(&self, file_name: &str) -> Result<PathBuf> {
        checked_name(file_name)?;
        Ok(self.weekly_dir().join(file_name))
    }
}

fn checked_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains("..")
    {
        return Err(CodeGaugeError::Render(format!(
            "invalid report file name: {file_name}"
        )));
    }
    Ok(())
}

fn read_dir_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn report_file(path: &Path, name: &str, kind: &str) -> Option<ReportFile> {
    let metadata = fs::metadata(path).ok()?;
    let modified: DateTime<Utc> = metadata.modified().ok()?.into();
    Some(ReportFile {
        name: name.to_string(),
        kind: kind.to_string(),
        size_bytes: metadata.len(),
        modified: modified.to_rfc3339(),
    })
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::OutputStore;
    use crate::classify::classify;
    use crate::fetch::FetchResult;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn unique_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        std::env::temp_dir().join(format!("codegauge_store_test_{nanos}_{counter}"))
    }

    fn sample_store() -> OutputStore {
        let store = OutputStore::new(unique_dir(), true);
        store.ensure().expect("ensure dirs");
        store
    }

    #[test]
    fn csv_round_trip_preserves_rows_and_columns() {
        let store = sample_store();
        let report = classify(&[FetchResult::success(
            "proj-a",
            json!({"data": [
                {"severity": "high", "rule": "doc-missing", "line": 42},
                {"severity": "low", "type": "api"}
            ]}),
        )]);

        let path = store
            .save_records_csv("export.csv", &report.all_records)
            .expect("export");

        let mut reader = csv::Reader::from_path(&path).expect("open csv");
        let headers: BTreeSet<String> = reader
            .headers()
            .expect("headers")
            .iter()
            .map(str::to_string)
            .collect();
        let expected: BTreeSet<String> = ["project_id", "severity", "rule", "line", "type"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(headers, expected);

        let rows: Vec<_> = reader.records().collect::<Result<_, _>>().expect("rows");
        assert_eq!(rows.len(), report.all_records.len());

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }

    #[test]
    fn csv_export_starts_with_utf8_bom() {
        let store = sample_store();
        let report = classify(&[FetchResult::success(
            "proj-a",
            json!({"data": [{"severity": "high"}]}),
        )]);

        let path = store
            .save_records_csv("bom.csv", &report.all_records)
            .expect("export");
        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }

    #[test]
    fn list_reports_filters_by_kind_and_sorts_newest_first() {
        let store = sample_store();
        store
            .save_text("uncommented_functions_report_20240101_000000.html", "<html>")
            .expect("write");
        store
            .save_text("duplicate_functions_report_20240102_000000.html", "<html>")
            .expect("write");
        store.save_text("notes.html", "<html>").expect("write");

        let all = store.list_reports(None).expect("list");
        assert_eq!(all.len(), 2);

        let duplicates = store.list_reports(Some("duplicate")).expect("list");
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].kind, "duplicate");

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }

    #[test]
    fn weekly_listing_filters_by_entity() {
        let store = sample_store();
        store
            .save_weekly("weekly_report_1001_20240101_000000.md", "# report")
            .expect("write");
        store
            .save_weekly("weekly_report_2002_20240101_000000.md", "# report")
            .expect("write");

        let all = store.list_weekly(None).expect("list");
        assert_eq!(all.len(), 2);

        let scoped = store.list_weekly(Some("1001")).expect("list");
        assert_eq!(scoped.len(), 1);
        assert!(scoped[0].name.contains("1001"));

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }

    #[test]
    fn latest_classified_picks_most_recent_snapshot() {
        let store = sample_store();
        store
            .save_json("classified_results_20240101_000000.json", &json!({"old": true}))
            .expect("write");
        std::thread::sleep(std::time::Duration::from_millis(20));
        store
            .save_json("classified_results_20240102_000000.json", &json!({"new": true}))
            .expect("write");

        let latest = store.latest_classified().expect("latest");
        assert!(
            latest
                .file_name()
                .and_then(|name| name.to_str())
                .expect("name")
                .contains("20240102")
        );

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }

    #[test]
    fn resolve_rejects_path_traversal() {
        let store = sample_store();
        assert!(store.resolve_report("../secrets.txt").is_err());
        assert!(store.resolve_report("a/b.html").is_err());
        assert!(store.resolve_report("report.html").is_ok());

        std::fs::remove_dir_all(store.output_dir()).expect("cleanup");
    }
}
