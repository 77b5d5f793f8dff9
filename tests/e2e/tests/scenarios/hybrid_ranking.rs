//! Hybrid ranking & tag intersection
//!
//! Seeds a small corpus and checks that the fused ranking surfaces the
//! chunk matching the query in both modalities, and that structured-tag
//! filters intersect across dimensions.

use mnemo_core::{
    ChunkFilter, RecallOptions, RememberOptions, StructuredTags, TagDimension,
};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn gpu_query_ranks_the_gpu_chunk_first() {
    let harness = TestMemory::with_mock_embeddings();
    let memory = &harness.memory;

    harness.seed_facts(&[
        "The RTX 4090 GPU forge box arrived yesterday",
        "coffee morning with the design team",
        "quarterly planning doc needs review",
        "the cat knocked over a plant again",
        "renewed the domain registration",
    ]);

    let results = memory
        .recall("GPU server for training", RecallOptions::default())
        .unwrap();

    assert!(!results.is_empty());
    assert!(
        results[0].content.contains("RTX 4090"),
        "top result was: {}",
        results[0].content
    );
}

#[test]
fn structured_tag_filter_requires_every_dimension() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let mut both_tags = StructuredTags::new();
    both_tags.insert(TagDimension::Projects, "Hephie");
    both_tags.insert(TagDimension::People, "Antreas");
    let both = memory
        .remember(
            "deploy checklist for the render farm",
            RememberOptions {
                tags: Some(both_tags),
                ..Default::default()
            },
        )
        .unwrap();

    let mut project_only = StructuredTags::new();
    project_only.insert(TagDimension::Projects, "Hephie");
    memory
        .remember(
            "deploy pipeline draft",
            RememberOptions {
                tags: Some(project_only),
                ..Default::default()
            },
        )
        .unwrap();

    let mut person_only = StructuredTags::new();
    person_only.insert(TagDimension::People, "Antreas");
    memory
        .remember(
            "deploy retro notes",
            RememberOptions {
                tags: Some(person_only),
                ..Default::default()
            },
        )
        .unwrap();

    let mut required = StructuredTags::new();
    required.insert(TagDimension::Projects, "Hephie");
    required.insert(TagDimension::People, "Antreas");

    let results = memory
        .recall(
            "deploy",
            RecallOptions {
                filter: ChunkFilter {
                    structured_tags: Some(required),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, both);
}

#[test]
fn tag_boost_reorders_hybrid_results() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let mut tagged = StructuredTags::new();
    tagged.insert(TagDimension::Projects, "Hephie");
    let boosted = memory
        .remember(
            "migration plan rough sketch",
            RememberOptions {
                tags: Some(tagged),
                ..Default::default()
            },
        )
        .unwrap();
    memory
        .remember("migration plan final version", RememberOptions::default())
        .unwrap();

    let mut boost = StructuredTags::new();
    boost.insert(TagDimension::Projects, "Hephie");

    let results = memory
        .store()
        .search_hybrid_boosted(
            "migration plan",
            None,
            10,
            &ChunkFilter::default(),
            &boost,
            &mnemo_core::HybridConfig::default(),
        )
        .unwrap();

    assert_eq!(results[0].chunk.id, boosted);
    // The boosted score strictly exceeds the unboosted runner-up
    assert!(results[0].combined_score > results[1].combined_score);
}

#[test]
fn identical_searches_return_identical_rankings() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    harness.seed_facts(&[
        "ranking stability probe alpha",
        "ranking stability probe beta",
        "ranking stability probe gamma",
        "ranking stability probe delta",
    ]);

    let run = || {
        memory
            .store()
            .search_hybrid(
                "ranking probe",
                None,
                10,
                &ChunkFilter::default(),
                &mnemo_core::HybridConfig::default(),
            )
            .unwrap()
            .into_iter()
            .map(|r| (r.chunk.id, r.combined_score))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}
