//! Smoke test: the full remember → recall → assemble → maintain loop

use mnemo_core::{QuerySignals, RecallOptions, RememberOptions, Tier};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn full_engine_round_trip() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    // Remember
    let id = memory
        .remember(
            "the render farm schedule moved to weekends",
            RememberOptions {
                category: Some("fact".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // Recall
    let found = memory
        .recall("render farm schedule", RecallOptions::default())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);

    // Assemble
    let context = memory
        .assemble_context(&QuerySignals::from_message("what about the render farm?"))
        .unwrap();
    assert!(context.included_chunk_ids.contains(&id));
    assert!(context.total_tokens <= context.budget_tokens);

    // Promote and verify
    let promoted = memory.promote_to_long_term(&id).unwrap();
    assert_eq!(promoted.tier, Tier::LongTerm);

    // Maintain
    let summary = memory.run_maintenance().unwrap();
    assert!(summary.vacuum.errors.is_empty());

    // Stats reflect the single chunk
    let stats = memory.stats().unwrap();
    assert_eq!(stats.total_chunks, 1);
    assert_eq!(stats.by_tier.get("long_term"), Some(&1));

    // Shutdown fences further use
    memory.close();
    assert!(memory.stats().is_err());
}
