//! Maintenance Scheduler
//!
//! Background driver for the maintenance cycles: a tokio task wakes on a
//! fixed interval and runs the full pass against a shared engine. The
//! scheduler stops cleanly on request and steps aside once the engine
//! closes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::Memory;

/// Default interval between maintenance passes
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Periodic maintenance driver
pub struct MaintenanceScheduler {
    interval: Duration,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for MaintenanceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAINTENANCE_INTERVAL)
    }
}

impl MaintenanceScheduler {
    /// Create a scheduler with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the background task is running
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Start the background task; a second start replaces the first
    ///
    /// Must be called from within a tokio runtime. The task exits on its
    /// own when the engine reports closed.
    pub fn start(&self, memory: Arc<Memory>) {
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the initial
            // pass happens one interval after start
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if memory.is_closed() {
                    tracing::debug!("Engine closed, maintenance scheduler exiting");
                    break;
                }

                match memory.run_maintenance() {
                    Ok(summary) => {
                        if summary.expired_deleted + summary.demoted + summary.promoted > 0 {
                            tracing::info!(
                                "Maintenance pass: {} expired, {} demoted, {} promoted",
                                summary.expired_deleted,
                                summary.demoted,
                                summary.promoted
                            );
                        }
                    }
                    Err(e) => tracing::warn!("Maintenance pass failed: {}", e),
                }
            }
        });

        let mut guard = self.handle.lock().expect("scheduler lock");
        if let Some(previous) = guard.replace(task) {
            previous.abort();
        }
    }

    /// Stop the background task
    pub fn stop(&self) {
        let mut guard = self.handle.lock().expect("scheduler lock");
        if let Some(task) = guard.take() {
            task.abort();
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// TESTS
// ============================================================================
