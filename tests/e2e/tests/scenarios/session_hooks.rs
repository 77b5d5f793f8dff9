//! Session hooks
//!
//! Pattern extraction feeds the facade: explicit-memory triggers land in
//! long-term, casual facts in short-term, and compaction leaves a topics
//! trail - all retrievable afterwards.

use mnemo_core::{Message, RecallOptions, SessionHooks, Tier};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn a_conversation_becomes_retrievable_memory() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    let hooks = SessionHooks::new();

    let transcript = vec![
        Message::new("user", "remember that the prod database lives on host carbon"),
        Message::new("assistant", "Noted."),
        Message::new("user", "we decided to ship the importer behind a flag"),
        Message::new("system", "remember that system prompts are not extractable"),
    ];

    let ids = hooks
        .on_session_end(memory, "sess-e2e-1", &transcript)
        .unwrap();
    assert_eq!(ids.len(), 2);

    // The explicit-memory fact went long-term and carries its source
    let important = memory.get_chunk(&ids[0]).unwrap().unwrap();
    assert_eq!(important.tier, Tier::LongTerm);
    assert_eq!(important.source.as_deref(), Some("sess-e2e-1"));
    assert!(important.is_important());

    // The decision stayed short-term with its category
    let decision = memory.get_chunk(&ids[1]).unwrap().unwrap();
    assert_eq!(decision.tier, Tier::ShortTerm);
    assert_eq!(decision.category.as_deref(), Some("decision"));

    // Both are retrievable through normal recall
    let found = memory
        .recall("prod database host", RecallOptions::default())
        .unwrap();
    assert!(found.iter().any(|c| c.id == ids[0]));
}

#[test]
fn extracted_facts_carry_extracted_tags() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    let hooks = SessionHooks::new();

    let transcript = vec![Message::new(
        "user",
        "remember that the GPU training box for project Hephie needs new fans",
    )];

    let ids = hooks.on_session_end(memory, "sess-e2e-2", &transcript).unwrap();
    let chunk = memory.get_chunk(&ids[0]).unwrap().unwrap();

    assert!(chunk
        .tags
        .contains(mnemo_core::TagDimension::Concepts, "gpu"));
    assert!(chunk
        .tags
        .contains(mnemo_core::TagDimension::Projects, "Hephie"));
}

#[test]
fn compaction_summarizes_recent_user_topics() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    let hooks = SessionHooks::new();

    let transcript: Vec<Message> = (0..8)
        .map(|i| Message::new("user", format!("question number {} about the cluster", i)))
        .collect();

    let ids = hooks.on_compaction(memory, "sess-e2e-3", &transcript).unwrap();
    let topics = memory.get_chunk(ids.last().unwrap()).unwrap().unwrap();

    assert!(topics.content.starts_with("Topics discussed: "));
    // Only the last five user messages contribute
    assert!(!topics.content.contains("question number 2"));
    assert!(topics.content.contains("question number 3"));
    assert!(topics.content.contains("question number 7"));
}

#[test]
fn promotion_cycle_picks_up_hook_output() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    let hooks = SessionHooks::new();

    // "don't forget" yields confidence 1.0, above the promotion threshold
    let transcript = vec![Message::new(
        "user",
        "don't forget the certificate renewal lands on the 14th",
    )];
    let ids = hooks.on_session_end(memory, "sess-e2e-4", &transcript).unwrap();

    // Already long-term from importance routing; a cycle leaves it stable
    memory.run_promotion_cycle().unwrap();
    assert_eq!(
        memory.get_chunk(&ids[0]).unwrap().unwrap().tier,
        Tier::LongTerm
    );
}
