//! Progress pipeline
//!
//! Store, stream, and tracker working together: events persist in order,
//! subscribers see them FIFO (single and batched), terminal events lock
//! sessions, and aggregation summarizes a run.

use std::sync::Arc;

use mnemo_core::{
    ProgressEvent, ProgressEventType, ProgressStore, ProgressStream, ProgressTracker,
    StreamFilter,
};

fn pipeline() -> (ProgressTracker, Arc<ProgressStore>, Arc<ProgressStream>) {
    let store = Arc::new(ProgressStore::open(":memory:").unwrap());
    let stream = Arc::new(ProgressStream::new());
    let tracker = ProgressTracker::new(Some(store.clone()), stream.clone());
    (tracker, store, stream)
}

#[test]
fn a_session_run_persists_in_emission_order() {
    let (tracker, store, _stream) = pipeline();

    tracker.on_spawned("run-1", "researcher", "spawned", None);
    tracker.on_started("run-1", "warming up");
    tracker.on_tool_call("run-1", "web_search", "searching");
    tracker.on_thinking("run-1", "weighing sources");
    tracker.on_progress("run-1", "first source read", Some(3), Some(0.6));
    tracker.on_completed("run-1", "report ready", Some(8200));

    let events = store.events_for_session("run-1").unwrap();
    let types: Vec<ProgressEventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            ProgressEventType::Spawned,
            ProgressEventType::Started,
            ProgressEventType::ToolCall,
            ProgressEventType::Thinking,
            ProgressEventType::Progress,
            ProgressEventType::Completed,
        ]
    );

    // Counters were stamped at emission time
    let progress = &events[4];
    assert_eq!(progress.metrics.tool_call_count, 1);
    assert_eq!(progress.metrics.thinking_block_count, 1);
    assert_eq!(progress.metrics.steps_completed, 1);
}

#[test]
fn subscribers_see_fifo_order_even_when_batched() {
    let (tracker, _store, stream) = pipeline();

    let mut single = stream.subscribe(StreamFilter::for_session("run-2"), None);
    let mut batched = stream.subscribe(StreamFilter::for_session("run-2"), Some(100));

    tracker.on_spawned("run-2", "worker", "spawned", None);
    tracker.on_started("run-2", "go");
    tracker.on_progress("run-2", "step", None, None);

    // Single-delivery subscriber saw everything immediately, in order
    let mut singles = Vec::new();
    while let Some(delivery) = single.try_recv() {
        singles.extend(delivery.into_events());
    }
    assert_eq!(singles.len(), 3);
    assert_eq!(singles[0].event_type, ProgressEventType::Spawned);
    assert_eq!(singles[2].event_type, ProgressEventType::Progress);

    // Batched subscriber is still buffering
    assert!(batched.try_recv().is_none());

    std::thread::sleep(std::time::Duration::from_millis(120));
    tracker.on_completed("run-2", "done", None);

    let batch: Vec<ProgressEvent> = batched.try_recv().unwrap().into_events();
    assert_eq!(batch.len(), 4);
    let order: Vec<ProgressEventType> = batch.iter().map(|e| e.event_type).collect();
    assert_eq!(
        order,
        vec![
            ProgressEventType::Spawned,
            ProgressEventType::Started,
            ProgressEventType::Progress,
            ProgressEventType::Completed,
        ]
    );
}

#[test]
fn terminal_locks_and_active_sessions_shrink() {
    let (tracker, store, _stream) = pipeline();

    tracker.on_started("alive", "running");
    tracker.on_started("doomed", "running");
    tracker.on_failed("doomed", "exploded", Some("panic in worker"));

    assert_eq!(store.active_sessions().unwrap(), vec!["alive"]);

    // The locked session drops every further event
    assert!(tracker.on_progress("doomed", "zombie", None, None).is_none());
    assert_eq!(store.events_for_session("doomed").unwrap().len(), 2);
}

#[test]
fn aggregation_summarizes_a_run() {
    let (tracker, store, _stream) = pipeline();

    tracker.on_spawned("run-3", "analyst", "spawned", None);
    tracker.on_tool_call("run-3", "grep", "scan");
    tracker.on_tool_call("run-3", "read", "open file");
    tracker.on_tool_call("run-3", "grep", "scan again");
    tracker.on_completed("run-3", "done", Some(4100));

    let aggregate = store.aggregate("run-3").unwrap();
    assert_eq!(aggregate.counts_by_type.get("TOOL_CALL"), Some(&3));
    assert_eq!(aggregate.counts_by_type.get("COMPLETED"), Some(&1));
    assert_eq!(aggregate.unique_tools, vec!["grep", "read"]);
    assert_eq!(aggregate.completion_percentage, 100.0);
    assert!(aggregate.elapsed_ms.unwrap_or(0) >= 0);
}

#[test]
fn unsubscribe_flushes_the_pending_batch() {
    let (tracker, _store, stream) = pipeline();
    let mut sub = stream.subscribe(StreamFilter::default(), Some(60_000));

    tracker.on_started("run-4", "buffered forever otherwise");
    assert!(sub.try_recv().is_none());

    stream.unsubscribe(sub.id);
    let flushed = sub.try_recv().unwrap().into_events();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].session_key, "run-4");
}

#[test]
fn progress_store_composes_with_the_chunk_store_in_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("composed.db");

    // Chunk schema first, then the progress schema into the same file
    let memory = mnemo_core::Memory::open(&db).unwrap();
    let progress = ProgressStore::open(&db).unwrap();

    memory
        .remember(
            "chunk and events share a file",
            mnemo_core::RememberOptions::default(),
        )
        .unwrap();
    progress
        .insert(&ProgressEvent::new(
            "s1",
            "agent",
            ProgressEventType::Started,
            "sharing",
        ))
        .unwrap();

    // Both substrates read back through their own surfaces
    assert_eq!(memory.stats().unwrap().total_chunks, 1);
    assert_eq!(progress.events_for_session("s1").unwrap().len(), 1);
}

#[test]
fn nested_sessions_carry_parent_keys() {
    let (tracker, store, _stream) = pipeline();

    tracker.on_spawned("parent", "lead", "spawned", None);
    tracker.on_spawned("child", "helper", "spawned", Some("parent"));

    let child_events = store.events_for_session("child").unwrap();
    assert_eq!(
        child_events[0].metadata.parent_session_key.as_deref(),
        Some("parent")
    );
}
