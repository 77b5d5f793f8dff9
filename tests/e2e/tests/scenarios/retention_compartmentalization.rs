//! Retention & compartmentalization
//!
//! A chunk scoped to one subject must never surface in another subject's
//! retrieval - not from recall, not from context assembly - while
//! unscoped chunks stay visible to everyone.

use mnemo_core::{QuerySignals, RecallOptions, Tier};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn scoped_chunks_stay_walled_off() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let l1 = harness.seed_scoped(
        "Alice's salary expectations",
        Tier::ShortTerm,
        Some("Laura"),
    );
    let l2 = harness.seed_scoped("Alice's public role", Tier::LongTerm, None);

    // Another subject's recall never sees the scoped chunk
    let giannis = memory
        .recall("alice salary", RecallOptions::for_person("Giannis"))
        .unwrap();
    assert!(giannis.iter().all(|c| c.id != l1));

    // Context assembly for that subject includes the open chunk only
    let mut signals = QuerySignals::from_message("alice");
    signals.current_person = Some("Giannis".to_string());
    let context = memory.assemble_context(&signals).unwrap();

    assert!(context.included_chunk_ids.contains(&l2));
    assert!(!context.included_chunk_ids.contains(&l1));
}

#[test]
fn owner_and_admin_contexts_see_scoped_chunks() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let secret = harness.seed_scoped(
        "Alice's salary expectations",
        Tier::ShortTerm,
        Some("Laura"),
    );

    let laura = memory
        .recall("alice salary", RecallOptions::for_person("Laura"))
        .unwrap();
    assert!(laura.iter().any(|c| c.id == secret));

    // No current person = administrative context, full visibility
    let admin = memory.recall("alice salary", RecallOptions::default()).unwrap();
    assert!(admin.iter().any(|c| c.id == secret));
}

#[test]
fn short_term_chunks_receive_retention_expiry() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let id = harness.seed_scoped("temporary note", Tier::ShortTerm, None);
    let chunk = memory.get_chunk(&id).unwrap().unwrap();
    let expires = chunk.expires_at.expect("short-term expiry");
    assert!(expires > chunk.created_at);

    let long = harness.seed_scoped("durable note", Tier::LongTerm, None);
    assert!(memory.get_chunk(&long).unwrap().unwrap().expires_at.is_none());
}
