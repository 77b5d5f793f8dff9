//! Export / Restore
//!
//! Plain-text backup of the chunk table: one JSON object per line, full
//! chunk fields, no vectors (embeddings regenerate from content via the
//! facade's backfill). Restore preserves ids and timestamps and skips
//! chunks that already exist, so restoring into a live store is safe.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::memory::{Chunk, ListOptions, SortOrder};
use crate::storage::{ChunkStore, Result};

/// Page size for the export scan
const EXPORT_PAGE: i64 = 500;

/// Outcome of a restore run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Chunks inserted
    pub restored: i64,
    /// Chunks skipped because their id already exists
    pub skipped: i64,
    /// Unparsable or rejected lines
    pub errors: Vec<String>,
}

/// Write every chunk as one JSON line; returns the count written
pub fn export_chunks(store: &ChunkStore, mut writer: impl Write) -> Result<i64> {
    let mut exported = 0i64;
    let mut offset = 0i64;

    loop {
        let page = store.get_all(&ListOptions {
            limit: EXPORT_PAGE,
            offset,
            order: SortOrder::Asc,
            ..Default::default()
        })?;
        if page.is_empty() {
            break;
        }
        offset += page.len() as i64;

        for chunk in page {
            let line = serde_json::to_string(&chunk).map_err(|e| {
                crate::storage::StoreError::InvalidArgument(format!(
                    "Unencodable chunk {}: {}",
                    chunk.id, e
                ))
            })?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            exported += 1;
        }
    }

    Ok(exported)
}

/// Export to a file path (parent directories created)
pub fn export_to_path(store: &ChunkStore, path: impl AsRef<Path>) -> Result<i64> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    export_chunks(store, std::io::BufWriter::new(file))
}

/// Restore chunks from a JSON-lines reader
///
/// Existing ids are skipped; malformed lines are recorded and the restore
/// continues.
pub fn restore_chunks(store: &ChunkStore, reader: impl BufRead) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let chunk: Chunk = match serde_json::from_str(&line) {
            Ok(chunk) => chunk,
            Err(e) => {
                report.errors.push(format!("line {}: {}", line_no + 1, e));
                continue;
            }
        };

        if store.restore(&chunk)? {
            report.restored += 1;
        } else {
            report.skipped += 1;
        }
    }

    Ok(report)
}

/// Restore from a file path
pub fn restore_from_path(store: &ChunkStore, path: impl AsRef<Path>) -> Result<RestoreReport> {
    let file = std::fs::File::open(path)?;
    restore_chunks(store, BufReader::new(file))
}

// ============================================================================
// TESTS
// ============================================================================
