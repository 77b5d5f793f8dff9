//! Progress Stream
//!
//! In-process publish/subscribe bus for progress events. Subscribers
//! register a filter (session and/or event types) and receive either
//! single events synchronously or batches buffered over an interval
//! (floor 100 ms). Delivery is FIFO per subscriber; a pending batch
//! flushes when its subscriber unsubscribes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::event::{ProgressEvent, ProgressEventType};

// ============================================================================
// FILTER & DELIVERY
// ============================================================================

/// Enforced floor for batch intervals
pub const MIN_BATCH_INTERVAL_MS: u64 = 100;

/// Subscriber filter
#[derive(Debug, Clone, Default)]
pub struct StreamFilter {
    /// Only events of this session
    pub session_key: Option<String>,
    /// Only these event types (empty = all)
    pub event_types: Vec<ProgressEventType>,
}

impl StreamFilter {
    /// Filter scoped to one session
    pub fn for_session(session_key: impl Into<String>) -> Self {
        Self {
            session_key: Some(session_key.into()),
            ..Default::default()
        }
    }

    /// Whether an event passes this filter
    pub fn matches(&self, event: &ProgressEvent) -> bool {
        if let Some(session_key) = &self.session_key {
            if &event.session_key != session_key {
                return false;
            }
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        true
    }
}

/// What a subscriber receives
#[derive(Debug, Clone)]
pub enum Delivery {
    /// One event, delivered synchronously at publish time
    Single(ProgressEvent),
    /// Events buffered over the batch interval, in emission order
    Batch(Vec<ProgressEvent>),
}

impl Delivery {
    /// Flatten into the contained events
    pub fn into_events(self) -> Vec<ProgressEvent> {
        match self {
            Delivery::Single(event) => vec![event],
            Delivery::Batch(events) => events,
        }
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// A live subscription handle
pub struct Subscription {
    /// Identifier used to unsubscribe
    pub id: u64,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Await the next delivery
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Non-blocking poll
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}

struct BatchState {
    interval: Duration,
    buffer: Vec<ProgressEvent>,
    last_flush: Instant,
}

struct Subscriber {
    id: u64,
    filter: StreamFilter,
    sender: mpsc::UnboundedSender<Delivery>,
    batch: Option<BatchState>,
}

// ============================================================================
// STREAM
// ============================================================================

/// The pub/sub bus
#[derive(Default)]
pub struct ProgressStream {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ProgressStream {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber
    ///
    /// With `batch_interval_ms` set, events buffer until the interval
    /// elapses (clamped up to the 100 ms floor); otherwise every matching
    /// event is delivered individually at publish time.
    pub fn subscribe(
        &self,
        filter: StreamFilter,
        batch_interval_ms: Option<u64>,
    ) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let batch = batch_interval_ms.map(|interval| BatchState {
            interval: Duration::from_millis(interval.max(MIN_BATCH_INTERVAL_MS)),
            buffer: Vec::new(),
            last_flush: Instant::now(),
        });

        let mut subscribers = self.subscribers.lock().expect("stream lock");
        subscribers.push(Subscriber {
            id,
            filter,
            sender,
            batch,
        });

        Subscription { id, receiver }
    }

    /// Remove a subscriber, flushing any buffered batch first
    pub fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock().expect("stream lock");
        if let Some(position) = subscribers.iter().position(|s| s.id == id) {
            let mut subscriber = subscribers.remove(position);
            if let Some(batch) = subscriber.batch.as_mut() {
                if !batch.buffer.is_empty() {
                    let _ = subscriber
                        .sender
                        .send(Delivery::Batch(std::mem::take(&mut batch.buffer)));
                }
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Flush every batched subscriber whose interval has elapsed
    ///
    /// Publish-time flushing covers busy streams; the timer task calls
    /// this so a quiet stream's last batch still goes out.
    pub fn flush_due(&self) {
        let mut subscribers = self.subscribers.lock().expect("stream lock");
        subscribers.retain_mut(|subscriber| match subscriber.batch.as_mut() {
            Some(batch)
                if !batch.buffer.is_empty() && batch.last_flush.elapsed() >= batch.interval =>
            {
                batch.last_flush = Instant::now();
                subscriber
                    .sender
                    .send(Delivery::Batch(std::mem::take(&mut batch.buffer)))
                    .is_ok()
            }
            _ => true,
        });
    }

    /// Spawn the batched-delivery timer
    ///
    /// Ticks at half the interval floor and flushes due batches until the
    /// returned handle is aborted. Must be called inside a tokio runtime.
    pub fn spawn_flush_timer(stream: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(MIN_BATCH_INTERVAL_MS / 2));
            loop {
                ticker.tick().await;
                stream.flush_due();
            }
        })
    }

    /// Publish an event to every matching subscriber
    ///
    /// Single-delivery subscribers receive it before this call returns;
    /// batched subscribers buffer it and flush once their interval has
    /// elapsed. Subscribers whose receiving end is gone are dropped.
    pub fn publish(&self, event: &ProgressEvent) {
        let mut subscribers = self.subscribers.lock().expect("stream lock");

        subscribers.retain_mut(|subscriber| {
            if !subscriber.filter.matches(event) {
                return true;
            }

            match subscriber.batch.as_mut() {
                None => subscriber.sender.send(Delivery::Single(event.clone())).is_ok(),
                Some(batch) => {
                    batch.buffer.push(event.clone());
                    if batch.last_flush.elapsed() >= batch.interval {
                        batch.last_flush = Instant::now();
                        subscriber
                            .sender
                            .send(Delivery::Batch(std::mem::take(&mut batch.buffer)))
                            .is_ok()
                    } else {
                        true
                    }
                }
            }
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================
