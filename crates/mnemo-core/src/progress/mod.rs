//! Orchestration Progress Core
//!
//! A second persistent substrate, distinct from chunks: an append-only
//! log of sub-agent progress events, an in-process pub/sub stream with
//! filtered and batched delivery, and a tracker that feeds both while
//! maintaining per-session state.

mod event;
mod store;
mod stream;
mod tracker;

pub use event::{ProgressEvent, ProgressEventType, ProgressMetadata, ProgressMetrics};
pub use store::{ProgressAggregate, ProgressQuery, ProgressStore};
pub use stream::{Delivery, ProgressStream, StreamFilter, Subscription, MIN_BATCH_INTERVAL_MS};
pub use tracker::ProgressTracker;
