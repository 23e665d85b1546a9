//! Periodic and threshold-triggered pruning of revision history.

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Compaction and size-monitoring parameters.
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    /// Revisions retained per document. Default: 5.
    pub versions_to_keep: usize,

    /// Time between scheduled passes. Default: 24h.
    pub interval: Duration,

    /// Document count above which `monitor_size` triggers an immediate
    /// pass. Default: 1000.
    pub size_threshold: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            versions_to_keep: 5,
            interval: Duration::from_secs(24 * 60 * 60),
            size_threshold: 1000,
        }
    }
}

struct Timer {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Runs maintenance passes: on start, on a timer, and on demand when the
/// store outgrows its size threshold.
///
/// Pass failures are logged and never abort the scheduler; the next
/// scheduled run proceeds normally. One timer per compactor; starting it
/// again tears down the previous one.
pub struct Compactor {
    engine: Arc<dyn Engine>,
    config: MaintenanceConfig,
    timer: Mutex<Option<Timer>>,
}

impl Compactor {
    pub fn new(engine: Arc<dyn Engine>, config: MaintenanceConfig) -> Self {
        Self {
            engine,
            config,
            timer: Mutex::new(None),
        }
    }

    /// One maintenance pass: reclaim superseded revisions beyond the
    /// retained count, then drop orphaned view state.
    pub fn run_pass(&self) -> Result<()> {
        execute_pass(self.engine.as_ref(), self.config.versions_to_keep)
    }

    /// Targeted cleanup of one document's history outside the periodic
    /// pass: keeps the newest `versions_to_keep` revisions and deletes
    /// the rest explicitly. Returns how many revisions were purged.
    pub fn clean_document_history(&self, key: &str) -> Result<usize> {
        let revisions = self.engine.revisions(key)?;
        let mut purged = 0;
        for rev in revisions.iter().skip(self.config.versions_to_keep) {
            self.engine.purge(key, rev)?;
            purged += 1;
        }
        if purged > 0 {
            tracing::debug!(key, purged, "cleaned document history");
        }
        Ok(purged)
    }

    /// Coarse size check: when the total document count exceeds the
    /// threshold, run one immediate maintenance pass. Returns whether a
    /// pass was triggered. Two racing checks may both fire; that is
    /// wasteful but harmless.
    pub fn monitor_size(&self) -> Result<bool> {
        let info = self.engine.info()?;
        if info.doc_count > self.config.size_threshold {
            tracing::info!(
                doc_count = info.doc_count,
                threshold = self.config.size_threshold,
                "size threshold exceeded, running maintenance"
            );
            self.run_pass()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Start the periodic timer: one pass now, then one every interval.
    /// Tears down any previous timer first.
    pub fn start(&self) {
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();

        let thread = std::thread::spawn(move || loop {
            if let Err(e) = execute_pass(engine.as_ref(), config.versions_to_keep) {
                tracing::warn!(error = %e, "scheduled maintenance failed");
            }
            match stop_rx.recv_timeout(config.interval) {
                // Timeout: interval elapsed, run the next pass.
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                // Stop requested or compactor dropped.
                _ => return,
            }
        });

        *self.timer.lock() = Some(Timer {
            stop: stop_tx,
            thread,
        });
    }

    /// Stop the periodic timer. Idempotent.
    pub fn stop(&self) {
        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            let _ = timer.stop.send(());
            let _ = timer.thread.join();
        }
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute_pass(engine: &dyn Engine, keep: usize) -> Result<()> {
    engine
        .compact(keep)
        .map_err(|e| StoreError::MaintenanceFailure(format!("compact: {e}")))?;
    engine
        .view_cleanup()
        .map_err(|e| StoreError::MaintenanceFailure(format!("view cleanup: {e}")))?;
    tracing::debug!(keep, "maintenance pass done");
    Ok(())
}
