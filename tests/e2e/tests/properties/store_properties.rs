//! Store invariant properties
//!
//! Checks that must hold for any history of valid operations: read-your-
//! writes, monotone updates, cascading deletes, promotion effects,
//! count accounting, and ranking stability.

use mnemo_core::{
    ChunkFilter, ChunkInput, ChunkPatch, ChunkStore, EmbeddingProvider, HybridConfig,
    StructuredTags, TagDimension, TagExtractor, Tier,
};
use mnemo_e2e_tests::mocks::MockEmbeddingProvider;

fn open_store() -> ChunkStore {
    ChunkStore::open(":memory:").unwrap()
}

#[test]
fn insert_then_get_reflects_every_field() {
    let store = open_store();

    let mut tags = StructuredTags::new();
    tags.insert(TagDimension::Projects, "Hephie");

    let mut input = ChunkInput::new("full field round trip");
    input.tier = Tier::LongTerm;
    input.summary = Some("round trip".to_string());
    input.source = Some("test".to_string());
    input.category = Some("fact".to_string());
    input.person = Some("Laura".to_string());
    input.tags = tags.clone();
    input.confidence = 0.42;

    let inserted = store.insert(input, None).unwrap();
    let fetched = store.get(&inserted.id).unwrap().unwrap();

    assert_eq!(fetched.content, "full field round trip");
    assert_eq!(fetched.tier, Tier::LongTerm);
    assert_eq!(fetched.summary.as_deref(), Some("round trip"));
    assert_eq!(fetched.source.as_deref(), Some("test"));
    assert_eq!(fetched.category.as_deref(), Some("fact"));
    assert_eq!(fetched.person.as_deref(), Some("Laura"));
    assert_eq!(fetched.tags, tags);
    assert_eq!(fetched.confidence, 0.42);
    assert_eq!(fetched.created_at, inserted.created_at);
}

#[test]
fn updates_are_monotone_and_visible() {
    let store = open_store();
    let chunk = store.insert(ChunkInput::new("v1"), None).unwrap();

    let mut last_updated = chunk.updated_at;
    for version in 2..=5 {
        let updated = store
            .update(
                &chunk.id,
                ChunkPatch {
                    content: Some(format!("v{}", version)),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(updated.content, format!("v{}", version));
        assert!(updated.updated_at >= last_updated);
        last_updated = updated.updated_at;
    }
}

#[test]
fn delete_removes_from_every_primitive() {
    let store = open_store();
    let provider = MockEmbeddingProvider::new();

    let content = "deletable fact about the scheduler";
    let vector = provider.embed(content).unwrap();
    let chunk = store
        .insert(ChunkInput::new(content), Some(&vector))
        .unwrap();

    assert!(store.delete(&chunk.id).unwrap());

    let filter = ChunkFilter::default();
    assert!(store.search_text("scheduler", 10, &filter).unwrap().is_empty());
    assert!(store
        .search_vector(&vector, 10, &filter)
        .unwrap()
        .iter()
        .all(|r| r.chunk.id != chunk.id));
    assert!(store
        .search_hybrid("scheduler", Some(&vector), 10, &filter, &HybridConfig::default())
        .unwrap()
        .iter()
        .all(|r| r.chunk.id != chunk.id));
    assert!(store.get(&chunk.id).unwrap().is_none());
}

#[test]
fn promote_sets_tier_and_promoted_at() {
    let store = open_store();
    let mut input = ChunkInput::new("promotable");
    input.tier = Tier::Working;
    let chunk = store.insert(input, None).unwrap();

    let promoted = store.promote(&chunk.id, Tier::ShortTerm).unwrap();
    assert_eq!(promoted.tier, Tier::ShortTerm);
    assert!(promoted.promoted_at.is_some());

    let again = store.promote(&chunk.id, Tier::LongTerm).unwrap();
    assert_eq!(again.tier, Tier::LongTerm);
    assert!(again.promoted_at.unwrap() >= promoted.promoted_at.unwrap());
}

#[test]
fn stats_track_inserts_minus_deletes() {
    let store = open_store();
    let mut ids = Vec::new();

    for i in 0..17 {
        let chunk = store
            .insert(ChunkInput::new(format!("countable {}", i)), None)
            .unwrap();
        ids.push(chunk.id);
    }
    for id in ids.iter().take(6) {
        store.delete(id).unwrap();
    }
    // Deleting a missing id must not change the count
    store.delete("never-existed").unwrap();

    assert_eq!(store.stats().unwrap().total_chunks, 17 - 6);
}

#[test]
fn compartmentalization_covers_tag_boosted_search() {
    let store = open_store();

    let mut secret = ChunkInput::new("walled off fact about budgets");
    secret.person = Some("Laura".to_string());
    secret.tags.insert(TagDimension::Concepts, "budget");
    let secret = store.insert(secret, None).unwrap();

    let mut boost = StructuredTags::new();
    boost.insert(TagDimension::Concepts, "budget");

    let results = store
        .search_hybrid_boosted(
            "budgets",
            None,
            10,
            &ChunkFilter::for_person("Giannis"),
            &boost,
            &HybridConfig::default(),
        )
        .unwrap();

    assert!(results.iter().all(|r| r.chunk.id != secret.id));
}

#[test]
fn vector_round_trip_scores_near_one() {
    let store = open_store();
    if !store.has_vector_index() {
        return;
    }
    let provider = MockEmbeddingProvider::new();

    let content = "the vector round trip law holds here";
    let vector = provider.embed(content).unwrap();
    let chunk = store
        .insert(ChunkInput::new(content), Some(&vector))
        .unwrap();

    let results = store
        .search_vector(&vector, 5, &ChunkFilter::default())
        .unwrap();
    assert_eq!(results[0].chunk.id, chunk.id);
    // Score 1/(1+d) with d ≈ 0
    assert!(results[0].combined_score > 0.99);
}

#[test]
fn extracted_tags_are_text_searchable() {
    let store = open_store();
    let extractor = TagExtractor::new();

    let content = "we moved the PyTorch training jobs to the Athens office";
    let tags = extractor.extract(content);
    assert!(!tags.is_empty());

    let mut input = ChunkInput::new(content);
    input.tags = tags.clone();
    let chunk = store.insert(input, None).unwrap();

    // Every extracted value is reachable through the inverted index
    for value in tags.flatten() {
        let results = store
            .search_text(&value, 10, &ChunkFilter::default())
            .unwrap();
        assert!(
            results.iter().any(|r| r.chunk.id == chunk.id),
            "tag value {:?} did not find its chunk",
            value
        );
    }
}

#[test]
fn hybrid_rankings_are_reproducible_with_vectors() {
    let store = open_store();
    let provider = MockEmbeddingProvider::new();

    for i in 0..10 {
        let content = format!("reproducibility probe number {}", i);
        let vector = provider.embed(&content).unwrap();
        store.insert(ChunkInput::new(content), Some(&vector)).unwrap();
    }

    let query_vec = provider.embed("reproducibility probe").unwrap();
    let run = || {
        store
            .search_hybrid(
                "reproducibility probe",
                Some(&query_vec),
                5,
                &ChunkFilter::default(),
                &HybridConfig::default(),
            )
            .unwrap()
            .into_iter()
            .map(|r| (r.chunk.id, r.combined_score))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}
