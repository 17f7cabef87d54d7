//! Locates the output directory a finished job produced.
//!
//! Engines name their output folder `<timestamp>_<label>`, choosing the
//! timestamp themselves, so the only correlation available is a suffix match
//! on the label. Labels repeat across runs; the most recently created match
//! wins.
//!
//! The match uses the label exactly as the caller supplied it. Engines
//! sanitize the label before naming the folder (spaces and punctuation become
//! `_`, long labels are truncated), so a label that changes under
//! sanitization will not resolve.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Find the newest subdirectory of any root whose name ends with `_<label>`.
///
/// Roots are searched in the given order; on equal creation times the first
/// match encountered is kept. Missing or unreadable roots are skipped.
pub fn resolve(label: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let suffix = format!("_{label}");
    let mut best: Option<(SystemTime, PathBuf)> = None;

    for root in roots {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "skipping candidate root");
                continue;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(&suffix) {
                continue;
            }
            let path = entry.path();
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if !meta.is_dir() {
                continue;
            }

            let created = creation_time(&meta);
            if best.as_ref().map_or(true, |(t, _)| created > *t) {
                best = Some((created, path));
            }
        }
    }

    best.map(|(_, path)| path)
}

/// Birth time where the filesystem records one, otherwise modification time.
fn creation_time(meta: &fs::Metadata) -> SystemTime {
    meta.created()
        .or_else(|_| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}
