//! Boundary behavior
//!
//! Edge inputs: empty content, oversized content, non-ASCII text, and
//! concurrent writers.

use std::sync::Arc;

use mnemo_core::{ChunkFilter, ChunkInput, ChunkStore, Memory, RememberOptions};

#[test]
fn empty_content_is_storable_but_unsearchable() {
    let store = ChunkStore::open(":memory:").unwrap();
    let chunk = store.insert(ChunkInput::new(""), None).unwrap();

    assert_eq!(store.get(&chunk.id).unwrap().unwrap().content, "");
    // An empty query has no tokens and returns the empty list
    assert!(store
        .search_text("", 10, &ChunkFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn ten_kilobyte_content_round_trips_and_matches() {
    let store = ChunkStore::open(":memory:").unwrap();

    let filler = "padding lorem verba ".repeat(550);
    let content = format!("{} xylophone9 marker", filler);
    assert!(content.len() > 10_000);

    let chunk = store.insert(ChunkInput::new(content.clone()), None).unwrap();
    assert_eq!(store.get(&chunk.id).unwrap().unwrap().content, content);

    let results = store
        .search_text("xylophone9", 10, &ChunkFilter::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, chunk.id);
}

#[test]
fn unicode_content_round_trips_byte_for_byte() {
    let store = ChunkStore::open(":memory:").unwrap();

    let samples = [
        "ελληνικά: η μνήμη είναι εύθραυστη",
        "日本語のメモ: 会議は木曜日です",
        "emoji soup 🚀🧠🔥 and ascii tail",
    ];

    for sample in samples {
        let chunk = store.insert(ChunkInput::new(sample), None).unwrap();
        let fetched = store.get(&chunk.id).unwrap().unwrap();
        assert_eq!(fetched.content.as_bytes(), sample.as_bytes());
    }
}

#[test]
fn twenty_concurrent_remembers_yield_twenty_distinct_ids() {
    let memory = Arc::new(Memory::open(":memory:").unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let memory = Arc::clone(&memory);
        handles.push(std::thread::spawn(move || {
            memory
                .remember(
                    &format!("concurrent fact number {}", i),
                    RememberOptions::default(),
                )
                .unwrap()
        }));
    }

    let ids: std::collections::HashSet<String> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(ids.len(), 20);
    assert_eq!(memory.stats().unwrap().total_chunks, 20);
}

#[test]
fn whitespace_only_tags_are_dropped() {
    let store = ChunkStore::open(":memory:").unwrap();

    let mut input = ChunkInput::new("tag hygiene check");
    input.tags.insert(mnemo_core::TagDimension::Concepts, "   ");
    input.tags.insert(mnemo_core::TagDimension::Concepts, "  real  ");

    let chunk = store.insert(input, None).unwrap();
    let fetched = store.get(&chunk.id).unwrap().unwrap();
    assert_eq!(fetched.tags.concepts, vec!["real"]);
}
