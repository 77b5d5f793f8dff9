//! Adversarial inputs
//!
//! Hostile strings must never reach the FTS parser or SQL as syntax, and
//! long interleaved operation histories must keep the invariants intact.

use mnemo_core::{ChunkFilter, ChunkInput, ChunkStore, RecallOptions, RememberOptions};
use mnemo_e2e_tests::harness::TestMemory;

/// Deterministic LCG so histories replay identically across runs
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn fts_operator_soup_is_inert() {
    let store = ChunkStore::open(":memory:").unwrap();
    store
        .insert(ChunkInput::new("an ordinary fact about parsers"), None)
        .unwrap();

    let hostile = [
        "NEAR(\"a\", 2)",
        "content: evil",
        "\"unterminated",
        "a AND b OR c NOT d",
        "* ^ ( ) { } [ ]",
        "-\"--\"",
        "fact*",
    ];

    for query in hostile {
        // Must not error; quoting reduces operators to plain tokens
        let results = store.search_text(query, 10, &ChunkFilter::default());
        assert!(results.is_ok(), "query {:?} errored: {:?}", query, results.err());
    }

    // Plain-token hostile queries still match legitimately
    let results = store
        .search_text("parsers AND nothing", 10, &ChunkFilter::default())
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn sql_injection_shapes_are_just_content() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let payloads = [
        "'; DROP TABLE chunks;--",
        "Robert\"); DELETE FROM chunk_fts;--",
        "?1 ?2 ?3",
    ];

    for payload in payloads {
        let id = memory.remember(payload, RememberOptions::default()).unwrap();
        let chunk = memory.get_chunk(&id).unwrap().unwrap();
        assert_eq!(chunk.content, payload);
    }

    // The table survived
    assert_eq!(memory.stats().unwrap().total_chunks, payloads.len() as i64);
}

#[test]
fn control_characters_round_trip() {
    let store = ChunkStore::open(":memory:").unwrap();
    let content = "tabs\tand\nnewlines\r\nand nulls \u{1} survive";
    let chunk = store.insert(ChunkInput::new(content), None).unwrap();
    assert_eq!(store.get(&chunk.id).unwrap().unwrap().content, content);
}

#[test]
fn long_interleaved_history_keeps_counts_consistent() {
    let store = ChunkStore::open(":memory:").unwrap();
    let mut rng = Lcg(0x5eed);
    let mut live: Vec<String> = Vec::new();
    let mut inserts = 0i64;
    let mut deletes = 0i64;

    for step in 0..400 {
        match rng.next() % 4 {
            // Insert dominates so the store grows
            0 | 1 => {
                let chunk = store
                    .insert(ChunkInput::new(format!("history step {}", step)), None)
                    .unwrap();
                live.push(chunk.id);
                inserts += 1;
            }
            2 if !live.is_empty() => {
                let index = (rng.next() as usize) % live.len();
                let id = live.swap_remove(index);
                assert!(store.delete(&id).unwrap());
                deletes += 1;
            }
            _ if !live.is_empty() => {
                let index = (rng.next() as usize) % live.len();
                let id = &live[index];
                // Read-your-writes across the whole history
                assert!(store.get(id).unwrap().is_some());
            }
            _ => {}
        }
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_chunks, inserts - deletes);
    assert_eq!(stats.total_chunks as usize, live.len());

    // Every surviving id is still readable; every deleted id is gone
    for id in &live {
        assert!(store.get(id).unwrap().is_some());
    }
}

#[test]
fn zero_and_negative_limits_are_harmless() {
    let store = ChunkStore::open(":memory:").unwrap();
    store.insert(ChunkInput::new("limit probe"), None).unwrap();

    let none = store.search_text("probe", 0, &ChunkFilter::default()).unwrap();
    assert!(none.is_empty());

    let hybrid = store
        .search_hybrid(
            "probe",
            None,
            0,
            &ChunkFilter::default(),
            &mnemo_core::HybridConfig::default(),
        )
        .unwrap();
    assert!(hybrid.is_empty());
}

#[test]
fn recall_with_absurd_budget_query_still_terminates() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    memory
        .remember("haystack needle fact", RememberOptions::default())
        .unwrap();

    // A query of hundreds of repeated tokens must not blow up the FTS layer
    let giant_query = "needle ".repeat(500);
    let results = memory.recall(&giant_query, RecallOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
}
