//! Error surface
//!
//! The taxonomy behaves as documented: typed errors for misuse, empty
//! results for degraded capability, and no panics anywhere on the input-
//! driven paths.

use mnemo_core::{
    ChunkPatch, RecallOptions, RememberOptions, SearchMode, StoreError, Tier,
};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn not_found_for_absent_ids() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    assert!(matches!(
        memory.promote_to_long_term("ghost").unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        memory.update("ghost", ChunkPatch::default()).unwrap_err(),
        StoreError::NotFound(_)
    ));

    // Reads and deletes of missing ids are not errors
    assert!(memory.get_chunk("ghost").unwrap().is_none());
    assert!(!memory.forget("ghost").unwrap());
}

#[test]
fn invalid_argument_for_bad_inputs() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    assert!(matches!(
        memory.remember("", RememberOptions::default()).unwrap_err(),
        StoreError::InvalidArgument(_)
    ));
    assert!(matches!(
        memory
            .remember(
                "confidence out of range",
                RememberOptions {
                    confidence: Some(2.0),
                    ..Default::default()
                },
            )
            .unwrap_err(),
        StoreError::InvalidArgument(_)
    ));

    // Dimension-mismatched embeddings are rejected at the store boundary
    let err = memory
        .store()
        .insert(mnemo_core::ChunkInput::new("x"), Some(&[1.0, 0.0, 0.0]))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[test]
fn invalid_transition_for_lattice_violations() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let id = memory
        .remember(
            "already at the top",
            RememberOptions {
                tier: Some(Tier::LongTerm),
                ..Default::default()
            },
        )
        .unwrap();

    match memory.store().promote(&id, Tier::ShortTerm).unwrap_err() {
        StoreError::InvalidTransition { from, to } => {
            assert_eq!(from, Tier::LongTerm);
            assert_eq!(to, Tier::ShortTerm);
        }
        other => panic!("expected InvalidTransition, got {:?}", other),
    }
}

#[test]
fn degraded_semantic_mode_returns_results_not_errors() {
    // No provider attached: semantic recall falls back to text retrieval
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let id = memory
        .remember("findable even without vectors", RememberOptions::default())
        .unwrap();

    let found = memory
        .recall(
            "findable vectors",
            RecallOptions {
                mode: SearchMode::Semantic,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(found.iter().any(|c| c.id == id));
}

#[test]
fn closed_engine_rejects_every_mutation_and_read() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    memory.close();

    assert!(matches!(
        memory.remember("x", RememberOptions::default()).unwrap_err(),
        StoreError::Closed
    ));
    assert!(matches!(
        memory.recall("x", RecallOptions::default()).unwrap_err(),
        StoreError::Closed
    ));
    assert!(matches!(memory.forget("x").unwrap_err(), StoreError::Closed));
    assert!(matches!(memory.stats().unwrap_err(), StoreError::Closed));
    assert!(matches!(
        memory.run_maintenance().unwrap_err(),
        StoreError::Closed
    ));
    assert!(matches!(
        memory
            .assemble_context(&mnemo_core::QuerySignals::from_message("x"))
            .unwrap_err(),
        StoreError::Closed
    ));
    assert!(matches!(
        memory.clear_working("sess").unwrap_err(),
        StoreError::Closed
    ));
}

#[test]
fn errors_render_readable_messages() {
    let harness = TestMemory::new_temp();
    let err = harness.memory.promote_to_long_term("missing-id").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("missing-id"));

    let closed = StoreError::Closed.to_string();
    assert!(closed.to_lowercase().contains("closed"));
}
