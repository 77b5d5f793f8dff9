//! Context budget
//!
//! The assembled context never exceeds its token budget, per-tier
//! partitions and chunk caps both bind, and excluded counts are reported
//! truthfully.

use mnemo_core::{
    ContextInjector, InjectorConfig, QuerySignals, RememberOptions, Tier, TierLimits,
};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn large_corpus_fits_a_two_thousand_token_budget() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    for i in 0..120 {
        memory
            .remember(
                &format!(
                    "everything item {} padded to roughly eighty characters of context text here",
                    i
                ),
                RememberOptions::default(),
            )
            .unwrap();
    }

    let mut signals = QuerySignals::from_message("everything");
    signals.total_token_budget = Some(2000);

    let context = memory.assemble_context(&signals).unwrap();

    assert!(context.total_tokens <= 2000);
    assert_eq!(context.budget_tokens, 2000);
    assert!(!context.included_chunk_ids.is_empty());
    assert!(context.utilization <= 1.0);
}

#[test]
fn empty_store_yields_empty_context() {
    let harness = TestMemory::new_temp();
    let context = harness
        .memory
        .assemble_context(&QuerySignals::from_message("anything at all"))
        .unwrap();

    assert!(context.included_chunk_ids.is_empty());
    assert!(context.sections.is_empty());
    assert_eq!(context.total_tokens, 0);
}

#[test]
fn excluded_counts_report_what_did_not_fit() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    for i in 0..15 {
        memory
            .remember(
                &format!("candidate chunk number {} for the budget squeeze", i),
                RememberOptions::default(),
            )
            .unwrap();
    }

    let context = memory
        .assemble_context(&QuerySignals::from_message("candidate budget"))
        .unwrap();

    let short = context
        .sections
        .iter()
        .find(|s| s.tier == Tier::ShortTerm)
        .expect("short-term section");

    // Default short-term cap is 5; the rest must be counted, not dropped
    assert!(short.chunk_ids.len() <= 5);
    assert!(short.excluded_count >= 1);
    assert_eq!(
        short.chunk_ids.len(),
        short.content.lines().count(),
        "one bullet line per included chunk"
    );
}

#[test]
fn custom_caps_override_defaults() {
    let store = mnemo_core::ChunkStore::open(":memory:").unwrap();
    for i in 0..10 {
        let mut input = mnemo_core::ChunkInput::new(format!("capped item {}", i));
        input.tier = Tier::ShortTerm;
        store.insert(input, None).unwrap();
    }

    let injector = ContextInjector::with_config(InjectorConfig {
        limits: TierLimits {
            working: 20,
            short_term: 2,
            long_term: 10,
        },
        ..Default::default()
    });

    let context = injector
        .assemble(&store, None, &QuerySignals::from_message("capped"))
        .unwrap();

    let short = context
        .sections
        .iter()
        .find(|s| s.tier == Tier::ShortTerm)
        .unwrap();
    assert_eq!(short.chunk_ids.len(), 2);
}

#[test]
fn sections_use_the_published_headers() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    harness.seed_scoped("recent deploy note", Tier::ShortTerm, None);
    harness.seed_scoped("durable deploy fact", Tier::LongTerm, None);

    let context = memory
        .assemble_context(&QuerySignals::from_message("deploy"))
        .unwrap();

    assert!(context
        .full_text
        .contains("## Recent Context (Short-Term Memory)"));
    assert!(context.full_text.contains("## Known Facts (Long-Term Memory)"));
}
