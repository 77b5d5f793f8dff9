//! Tier lifecycle
//!
//! Promotion raises confident short-term chunks, decay demotes inactive
//! ones to episodic, and expiry hard-deletes. The retention window is
//! shrunk to milliseconds so the cycles fire inside the test.

use chrono::{Duration, Utc};
use mnemo_core::{RememberOptions, Tier};
use mnemo_e2e_tests::harness::TestMemory;

fn far_future() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(365)
}

#[test]
fn promotion_raises_confident_chunks_only() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let a = memory
        .remember(
            "high-confidence fact about the cluster",
            RememberOptions {
                confidence: Some(0.9),
                ..Default::default()
            },
        )
        .unwrap();
    let b = memory
        .remember(
            "low-confidence rumor about the cluster",
            RememberOptions {
                confidence: Some(0.3),
                ..Default::default()
            },
        )
        .unwrap();

    let promoted = memory.run_promotion_cycle().unwrap();
    assert!(promoted >= 1);

    let chunk_a = memory.get_chunk(&a).unwrap().unwrap();
    assert_eq!(chunk_a.tier, Tier::LongTerm);
    assert!(chunk_a.promoted_at.is_some());

    assert_eq!(memory.get_chunk(&b).unwrap().unwrap().tier, Tier::ShortTerm);
}

#[test]
fn decay_demotes_inactive_short_term_to_episodic() {
    let harness = TestMemory::with_short_retention(Duration::milliseconds(50));
    let memory = &harness.memory;

    // Far-future expiry so decay demotes instead of hard-deleting
    let c = memory
        .remember(
            "fact that will sit untouched",
            RememberOptions {
                confidence: Some(0.3),
                expires_at: Some(far_future()),
                ..Default::default()
            },
        )
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(120));

    let affected = memory.run_decay_cycle().unwrap();
    assert!(affected >= 1);

    let chunk = memory.get_chunk(&c).unwrap().unwrap();
    assert_eq!(chunk.tier, Tier::Episodic);
}

#[test]
fn decay_hard_deletes_expired_chunks() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let d = memory
        .remember(
            "chunk that already expired",
            RememberOptions {
                expires_at: Some(Utc::now() - Duration::milliseconds(1000)),
                ..Default::default()
            },
        )
        .unwrap();

    // Readable until the maintenance pass runs
    assert!(memory.get_chunk(&d).unwrap().is_some());

    let affected = memory.run_decay_cycle().unwrap();
    assert!(affected >= 1);
    assert!(memory.get_chunk(&d).unwrap().is_none());
}

#[test]
fn access_count_feeds_promotion() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let id = memory
        .remember(
            "fact recalled again and again",
            RememberOptions {
                confidence: Some(0.3),
                ..Default::default()
            },
        )
        .unwrap();

    // Each recall bumps accessCount; three is the promotion default
    for _ in 0..3 {
        memory
            .recall("recalled again", mnemo_core::RecallOptions::default())
            .unwrap();
    }
    assert!(memory.get_chunk(&id).unwrap().unwrap().access_count() >= 3);

    memory.run_promotion_cycle().unwrap();
    assert_eq!(memory.get_chunk(&id).unwrap().unwrap().tier, Tier::LongTerm);
}

#[test]
fn episodic_is_not_a_promotion_target() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let id = memory
        .remember("ordinary fact", RememberOptions::default())
        .unwrap();

    let err = memory.store().promote(&id, Tier::Episodic).unwrap_err();
    assert!(matches!(
        err,
        mnemo_core::StoreError::InvalidTransition { .. }
    ));
}
