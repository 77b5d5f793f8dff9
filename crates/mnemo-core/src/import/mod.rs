//! Migration / Import
//!
//! One-shot import of markdown memory files with an idempotency manifest:
//! a JSON map from content hash to chunk id, persisted at a
//! caller-supplied path. A hash already in the manifest means the chunk
//! was imported before and is skipped; re-running an import is therefore
//! free.
//!
//! The import is best-effort throughout: per-chunk embedding failures are
//! absorbed by the facade, manifest write failures are logged and
//! swallowed, and `migrate_all` records per-file errors without aborting
//! the batch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::engine::{Memory, RememberOptions};
use crate::memory::Tier;
use crate::storage::{Result, StoreError};
use crate::tags::TagExtractor;

// ============================================================================
// REPORT
// ============================================================================

/// Outcome of an import run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Chunks inserted this run
    pub chunks_created: i64,
    /// Chunks skipped because their hash was already in the manifest
    pub chunks_skipped: i64,
    /// Files visited
    pub files_processed: i64,
    /// Per-file errors (the batch continues past them)
    pub errors: Vec<String>,
}

impl ImportReport {
    fn absorb(&mut self, other: ImportReport) {
        self.chunks_created += other.chunks_created;
        self.chunks_skipped += other.chunks_skipped;
        self.files_processed += other.files_processed;
        self.errors.extend(other.errors);
    }
}

// ============================================================================
// IMPORTER
// ============================================================================

/// Markdown importer with a content-hash manifest
pub struct Importer {
    manifest_path: PathBuf,
    manifest: Mutex<BTreeMap<String, String>>,
    extractor: TagExtractor,
}

impl Importer {
    /// Create an importer backed by the manifest at `manifest_path`
    ///
    /// A missing or unreadable manifest starts empty; the import then
    /// re-creates it.
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        let manifest_path = manifest_path.into();
        let manifest = match std::fs::read_to_string(&manifest_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Manifest {} unparsable, starting fresh: {}", manifest_path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self {
            manifest_path,
            manifest: Mutex::new(manifest),
            extractor: TagExtractor::new(),
        }
    }

    /// Number of entries in the manifest
    pub fn manifest_len(&self) -> usize {
        self.manifest.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Import one markdown file into the given tier and subject
    pub fn migrate_file(
        &self,
        memory: &Memory,
        path: &Path,
        tier: Tier,
        person: Option<&str>,
    ) -> Result<ImportReport> {
        let text = std::fs::read_to_string(path)?;
        let mut report = ImportReport {
            files_processed: 1,
            ..Default::default()
        };

        for section in parse_markdown_sections(&text) {
            let hash = content_hash(&section.content);

            {
                let manifest = self
                    .manifest
                    .lock()
                    .map_err(|_| StoreError::Init("Manifest lock poisoned".into()))?;
                if manifest.contains_key(&hash) {
                    report.chunks_skipped += 1;
                    continue;
                }
            }

            let context: Vec<&str> =
                section.heading_trail.iter().map(String::as_str).collect();
            let tags = self.extractor.extract_with_context(&section.content, &context);

            let id = memory.remember(
                &section.content,
                RememberOptions {
                    tier: Some(tier),
                    person: person.map(str::to_string),
                    source: Some(path.display().to_string()),
                    // Tags attach whenever any dimension is non-empty
                    tags: (!tags.is_empty()).then_some(tags),
                    ..Default::default()
                },
            )?;

            {
                let mut manifest = self
                    .manifest
                    .lock()
                    .map_err(|_| StoreError::Init("Manifest lock poisoned".into()))?;
                manifest.insert(hash, id);
            }
            report.chunks_created += 1;
        }

        self.save_manifest();
        Ok(report)
    }

    /// Discover and import files by convention under `root`:
    ///
    /// - `MEMORY.md` → long-term
    /// - `memory/people/<name>.md` → long-term, scoped to `<name>`
    /// - `memory/YYYY-MM-DD.md` → episodic
    pub fn migrate_all(&self, memory: &Memory, root: &Path) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        let top = root.join("MEMORY.md");
        if top.is_file() {
            match self.migrate_file(memory, &top, Tier::LongTerm, None) {
                Ok(file_report) => report.absorb(file_report),
                Err(e) => report.errors.push(format!("{}: {}", top.display(), e)),
            }
        }

        let people_dir = root.join("memory").join("people");
        for path in markdown_files(&people_dir) {
            let person = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());
            match self.migrate_file(memory, &path, Tier::LongTerm, person.as_deref()) {
                Ok(file_report) => report.absorb(file_report),
                Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
            }
        }

        let memory_dir = root.join("memory");
        for path in markdown_files(&memory_dir) {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
            else {
                continue;
            };
            if NaiveDate::parse_from_str(&stem, "%Y-%m-%d").is_err() {
                continue;
            }
            match self.migrate_file(memory, &path, Tier::Episodic, None) {
                Ok(file_report) => report.absorb(file_report),
                Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
            }
        }

        Ok(report)
    }

    /// Persist the manifest; failures are logged, never raised
    fn save_manifest(&self) {
        let Ok(manifest) = self.manifest.lock() else {
            return;
        };
        let encoded = match serde_json::to_string_pretty(&*manifest) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Manifest encoding failed: {}", e);
                return;
            }
        };

        if let Some(parent) = self.manifest_path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        if let Err(e) = std::fs::write(&self.manifest_path, encoded) {
            tracing::warn!(
                "Manifest write to {} failed (import continues): {}",
                self.manifest_path.display(),
                e
            );
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

struct MarkdownSection {
    content: String,
    heading_trail: Vec<String>,
}

/// Split a markdown document into sections along headings
///
/// Each heading starts a new section; its body (non-empty lines until the
/// next heading) becomes the chunk content, with the heading trail kept
/// as the tag extractor's context path. A document with no headings is a
/// single section.
fn parse_markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut trail: Vec<(usize, String)> = Vec::new();
    let mut body = String::new();

    let flush = |body: &mut String, trail: &[(usize, String)], sections: &mut Vec<MarkdownSection>| {
        let content = body.trim().to_string();
        body.clear();
        if !content.is_empty() {
            sections.push(MarkdownSection {
                content,
                heading_trail: trail.iter().map(|(_, h)| h.clone()).collect(),
            });
        }
    };

    for line in text.lines() {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if hashes > 0 && line.chars().nth(hashes) == Some(' ') {
            flush(&mut body, &trail, &mut sections);
            let heading = line[hashes + 1..].trim().to_string();
            trail.retain(|(level, _)| *level < hashes);
            trail.push((hashes, heading));
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(&mut body, &trail, &mut sections);

    sections
}

/// SHA-256 of the trimmed content, lowercase hex
fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.trim().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

// ============================================================================
// TESTS
// ============================================================================
