//! Reads the engine's tabular result files.
//!
//! A results directory holds one CSV per audit category
//! (`axe_core_audit.csv`, `language_audit.csv`, ...). Every failure below the
//! directory level is recovered locally: a missing, unreadable, malformed or
//! non-UTF-8 file contributes zero rows.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// One row of a result file, keyed by the file's header. Column order is kept.
pub type ResultRow = IndexMap<String, String>;

const RESULT_EXTENSION: &str = "csv";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Case-insensitive equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFilter {
    pub field: String,
    pub value: String,
}

impl ValueFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Filter on the axe `impact` column.
    pub fn impact(value: impl Into<String>) -> Self {
        Self::new("impact", value)
    }

    fn matches(&self, row: &ResultRow) -> bool {
        let actual = row.get(&self.field).map(String::as_str).unwrap_or("");
        actual.to_lowercase() == self.value.to_lowercase()
    }
}

/// A parsed result file.
#[derive(Debug, Default)]
pub(crate) struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<ResultRow>,
}

/// Read rows from the result files in `dir`.
///
/// With a `category`, only `<category>.csv` is read. Otherwise every CSV in
/// the directory is read in filename order. The value filter applies only to
/// files whose header has the filtered column; `limit` caps the total.
pub fn read_rows(
    dir: &Path,
    category: Option<&str>,
    filter: Option<&ValueFilter>,
    limit: Option<usize>,
) -> Vec<ResultRow> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let filter = filter.filter(|f| !f.value.is_empty());
    let mut rows = Vec::new();

    for path in result_files(dir, category) {
        let Some(table) = read_table(&path) else {
            continue;
        };
        let mut file_rows = table.rows;

        if let Some(f) = filter {
            if table.headers.iter().any(|h| h == &f.field) {
                file_rows.retain(|row| f.matches(row));
            }
        }

        rows.extend(file_rows);

        if limit.is_some_and(|l| rows.len() >= l) {
            break;
        }
    }

    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

/// Result files to read, sorted by filename.
pub(crate) fn result_files(dir: &Path, category: Option<&str>) -> Vec<PathBuf> {
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        if !is_plain_category(category) {
            debug!(category = %category, "rejecting category outside the results directory");
            return Vec::new();
        }
        let target = dir.join(format!("{category}.{RESULT_EXTENSION}"));
        return if target.is_file() { vec![target] } else { Vec::new() };
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list results directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().and_then(|e| e.to_str()) == Some(RESULT_EXTENSION) && path.is_file()
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// A category names a file directly inside the results directory.
fn is_plain_category(category: &str) -> bool {
    !category.contains(['/', '\\']) && !category.contains("..")
}

/// Category name of a result file (its stem).
pub(crate) fn category_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse one CSV file. `None` means the file contributes nothing.
pub(crate) fn read_table(path: &Path) -> Option<Table> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable result file");
            return None;
        }
    };
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(str::to_string).collect(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping malformed result file");
            return None;
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping malformed result file");
                return None;
            }
        };
        let row: ResultRow = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    Some(Table { headers, rows })
}

/// A results directory found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ResultDirEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified_time: DateTime<Local>,
}

/// List every immediate subdirectory of every root, newest first.
pub fn list_result_dirs(roots: &[PathBuf]) -> Vec<ResultDirEntry> {
    let mut entries = Vec::new();

    for root in roots {
        let Ok(dir) = fs::read_dir(root) else {
            continue;
        };
        for entry in dir.flatten() {
            let path = entry.path();
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if !meta.is_dir() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            entries.push(ResultDirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                modified_time: modified.into(),
            });
        }
    }

    entries.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
    entries
}
