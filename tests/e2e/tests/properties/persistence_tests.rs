//! Persistence across reopen
//!
//! The database file is the durable truth: chunks, tags, embeddings, and
//! the vector index (rebuilt from the embeddings table) all survive an
//! engine restart, and legacy tag encodings upgrade transparently.

use std::sync::Arc;

use mnemo_core::{
    EmbeddingProvider, Memory, MemoryOptions, RecallOptions, RememberOptions, SearchMode, Tier,
};
use mnemo_e2e_tests::mocks::MockEmbeddingProvider;

#[test]
fn chunks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("persist.db");

    let id = {
        let memory = Memory::open(&db).unwrap();
        let id = memory
            .remember(
                "durable fact about the tape library",
                RememberOptions {
                    tier: Some(Tier::LongTerm),
                    person: Some("Laura".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        memory.close();
        id
    };

    let reopened = Memory::open(&db).unwrap();
    let chunk = reopened.get_chunk(&id).unwrap().unwrap();
    assert_eq!(chunk.content, "durable fact about the tape library");
    assert_eq!(chunk.tier, Tier::LongTerm);
    assert_eq!(chunk.person.as_deref(), Some("Laura"));

    // The inverted index came back with the base table
    let found = reopened
        .recall("tape library", RecallOptions::default())
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn vector_index_rebuilds_from_the_embeddings_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vectors.db");
    let content = "embedding that must survive a restart";

    {
        let memory = Memory::open_with(
            &db,
            MemoryOptions {
                provider: Some(Arc::new(MockEmbeddingProvider::new())),
                ..Default::default()
            },
        )
        .unwrap();
        memory.remember(content, RememberOptions::default()).unwrap();
        memory.close();
    }

    let reopened = Memory::open_with(
        &db,
        MemoryOptions {
            provider: Some(Arc::new(MockEmbeddingProvider::new())),
            ..Default::default()
        },
    )
    .unwrap();

    // Semantic search works immediately: the index reloaded at open
    let found = reopened
        .recall(
            content,
            RecallOptions {
                mode: SearchMode::Semantic,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].has_embedding);
}

#[test]
fn tag_vocabulary_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tags.db");
    let provider = MockEmbeddingProvider::new();

    {
        let memory = Memory::open(&db).unwrap();
        let vector = provider.embed("Hephie").unwrap();
        memory
            .store()
            .upsert_tag_embedding("Hephie", mnemo_core::TagDimension::Projects, &vector)
            .unwrap();
        memory.close();
    }

    let reopened = Memory::open(&db).unwrap();
    let stored = reopened
        .store()
        .tag_embedding("Hephie", mnemo_core::TagDimension::Projects)
        .unwrap();
    assert!(stored.is_some());
}

#[test]
fn legacy_flat_tag_rows_upgrade_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("legacy.db");

    let id = {
        let memory = Memory::open(&db).unwrap();
        let id = memory
            .remember("row written before the five-set encoding", RememberOptions::default())
            .unwrap();
        memory.close();
        id
    };

    // Plant the legacy flat-array encoding directly
    {
        let conn = rusqlite_open(&db);
        conn.execute(
            "UPDATE chunks SET tags = '[\"alpha\", \"beta\"]' WHERE id = ?1",
            [&id],
        )
        .unwrap();
    }

    let reopened = Memory::open(&db).unwrap();
    let chunk = reopened.get_chunk(&id).unwrap().unwrap();
    assert_eq!(chunk.tags.concepts, vec!["alpha", "beta"]);
    assert!(chunk.tags.projects.is_empty());
}

#[test]
fn stats_accumulate_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("stats.db");

    for session in 0..3 {
        let memory = Memory::open(&db).unwrap();
        memory
            .remember(
                &format!("fact from session {}", session),
                RememberOptions::default(),
            )
            .unwrap();
        memory.close();
    }

    let memory = Memory::open(&db).unwrap();
    assert_eq!(memory.stats().unwrap().total_chunks, 3);
}

/// Open the raw database for test fixture surgery
fn rusqlite_open(path: &std::path::Path) -> rusqlite::Connection {
    rusqlite::Connection::open(path).unwrap()
}
