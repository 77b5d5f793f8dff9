//! Test Database Manager
//!
//! Isolated memory-engine instances for tests: each harness owns its own
//! temporary directory (database file, import manifest) and cleans up on
//! drop. A deterministic mock embedding provider can be attached so the
//! semantic paths run without model downloads.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use mnemo_core::{MaintenanceConfig, Memory, MemoryOptions, RememberOptions, Tier};
use tempfile::TempDir;

use crate::mocks::MockEmbeddingProvider;

/// An isolated engine instance backed by a temporary directory
pub struct TestMemory {
    /// The engine under test
    pub memory: Memory,
    /// Temporary directory (kept alive to prevent premature deletion)
    temp_dir: TempDir,
}

impl TestMemory {
    /// Engine on a temporary on-disk database, no embedding provider
    pub fn new_temp() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let memory =
            Memory::open(temp_dir.path().join("mnemo.db")).expect("open memory engine");
        Self { memory, temp_dir }
    }

    /// Engine with the deterministic mock embedding provider attached
    pub fn with_mock_embeddings() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let memory = Memory::open_with(
            temp_dir.path().join("mnemo.db"),
            MemoryOptions {
                provider: Some(Arc::new(MockEmbeddingProvider::new())),
                ..Default::default()
            },
        )
        .expect("open memory engine");
        Self { memory, temp_dir }
    }

    /// Engine whose retention window is tiny, for decay tests
    pub fn with_short_retention(retention: Duration) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let memory = Memory::open_with(
            temp_dir.path().join("mnemo.db"),
            MemoryOptions {
                maintenance: MaintenanceConfig {
                    retention,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .expect("open memory engine");
        Self { memory, temp_dir }
    }

    /// Path inside this harness's temporary directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Seed a batch of short-term facts, returning their ids
    pub fn seed_facts(&self, contents: &[&str]) -> Vec<String> {
        contents
            .iter()
            .map(|content| {
                self.memory
                    .remember(content, RememberOptions::default())
                    .expect("seed fact")
            })
            .collect()
    }

    /// Seed one fact at a given tier for a given subject
    pub fn seed_scoped(&self, content: &str, tier: Tier, person: Option<&str>) -> String {
        self.memory
            .remember(
                content,
                RememberOptions {
                    tier: Some(tier),
                    person: person.map(str::to_string),
                    ..Default::default()
                },
            )
            .expect("seed scoped fact")
    }
}
