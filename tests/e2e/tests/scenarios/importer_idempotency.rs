//! Importer idempotency
//!
//! Importing the same file twice creates nothing new the second time; the
//! manifest carries the dedup across importer restarts too.

use mnemo_core::{Importer, ListOptions, Tier};
use mnemo_e2e_tests::harness::TestMemory;

#[test]
fn second_migration_skips_all_chunks() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let file = harness.path("MEMORY.md");
    std::fs::write(
        &file,
        "# Infrastructure\nthe forge box lives in the hallway rack\n\n# People\nAntreas reviews deploys on Mondays\n",
    )
    .unwrap();

    let importer = Importer::new(harness.path("manifest.json"));

    let first = importer
        .migrate_file(memory, &file, Tier::LongTerm, None)
        .unwrap();
    assert_eq!(first.chunks_created, 2);
    assert_eq!(first.chunks_skipped, 0);

    let second = importer
        .migrate_file(memory, &file, Tier::LongTerm, None)
        .unwrap();
    assert_eq!(second.chunks_created, 0);
    assert!(second.chunks_skipped >= 1);

    assert_eq!(memory.stats().unwrap().total_chunks, 2);
}

#[test]
fn manifest_persists_across_importer_instances() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;

    let file = harness.path("MEMORY.md");
    std::fs::write(&file, "the badge reader code is 4417\n").unwrap();

    Importer::new(harness.path("manifest.json"))
        .migrate_file(memory, &file, Tier::LongTerm, None)
        .unwrap();

    let report = Importer::new(harness.path("manifest.json"))
        .migrate_file(memory, &file, Tier::LongTerm, None)
        .unwrap();
    assert_eq!(report.chunks_created, 0);
    assert!(report.chunks_skipped >= 1);
    assert_eq!(memory.stats().unwrap().total_chunks, 1);
}

#[test]
fn migrate_all_routes_tiers_and_subjects() {
    let harness = TestMemory::new_temp();
    let memory = &harness.memory;
    let root = harness.path("vault");

    std::fs::create_dir_all(root.join("memory/people")).unwrap();
    std::fs::write(root.join("MEMORY.md"), "root fact worth keeping\n").unwrap();
    std::fs::write(
        root.join("memory/people/Laura.md"),
        "prefers short standups\n",
    )
    .unwrap();
    std::fs::write(
        root.join("memory/2026-05-01.md"),
        "spent the day untangling the ingest queue\n",
    )
    .unwrap();

    let importer = Importer::new(harness.path("manifest.json"));
    let report = importer.migrate_all(memory, &root).unwrap();

    assert_eq!(report.chunks_created, 3);
    assert!(report.errors.is_empty());

    let people = memory.get_by_person("Laura", &ListOptions::default()).unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].tier, Tier::LongTerm);

    let episodic = memory.get_by_tier(Tier::Episodic, &ListOptions::default()).unwrap();
    assert_eq!(episodic.len(), 1);

    // Imported chunks are retrievable through normal recall
    let found = memory
        .recall("ingest queue", mnemo_core::RecallOptions::default())
        .unwrap();
    assert!(found.iter().any(|c| c.tier == Tier::Episodic));
}
