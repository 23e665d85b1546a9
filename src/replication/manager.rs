//! Replication manager: one-shot exchange and live sessions.

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::replication::types::{
    Checkpoint, SyncDirection, SyncEvent, SyncHandle, SyncOptions, SyncStats,
};
use crate::retry::{with_conflict_retry, RetryPolicy};
use crate::types::{Document, Revision};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Everything a sync worker needs, cloneable into the session thread.
#[derive(Clone)]
struct Exchange {
    local: Arc<dyn Engine>,
    remote: Arc<dyn Engine>,
    options: SyncOptions,
    retry: RetryPolicy,
    checkpoint: Arc<Mutex<Checkpoint>>,
}

impl Exchange {
    /// Drain up to `batches_limit` pages in one direction.
    ///
    /// Returns how many documents were written to the receiving side and
    /// whether the source feed was fully drained.
    fn run_direction(&self, direction: SyncDirection) -> Result<(u64, bool)> {
        let (source, target) = match direction {
            SyncDirection::Push => (&self.local, &self.remote),
            SyncDirection::Pull => (&self.remote, &self.local),
        };

        let mut applied = 0u64;
        let mut drained = false;

        for _ in 0..self.options.batches_limit.max(1) {
            let since = {
                let checkpoint = self.checkpoint.lock();
                match direction {
                    SyncDirection::Push => checkpoint.push_seq,
                    SyncDirection::Pull => checkpoint.pull_seq,
                }
            };

            let batch = source.changes_since(since, self.options.batch_size)?;
            if batch.is_empty() {
                drained = true;
                break;
            }

            for change in &batch.changes {
                if self.apply_change(target.as_ref(), change)? {
                    applied += 1;
                }
            }

            let mut checkpoint = self.checkpoint.lock();
            match direction {
                SyncDirection::Push => checkpoint.push_seq = batch.last_seq,
                SyncDirection::Pull => checkpoint.pull_seq = batch.last_seq,
            }
        }

        Ok((applied, drained))
    }

    /// Apply one change-feed entry to the receiving engine.
    ///
    /// Winner selection is by revision generation, digest as tiebreak, so
    /// both replicas converge on the same head regardless of direction.
    /// A tombstoned target reads as absent here, so a live source head
    /// recreates the document without consulting the tombstone's
    /// generation: a delete racing an edit converges on the edit once the
    /// editing side replicates. Races with foreground writers are
    /// absorbed by conflict retry.
    fn apply_change(&self, target: &dyn Engine, change: &Document) -> Result<bool> {
        let source_rev = match &change.rev {
            Some(rev) => rev,
            None => return Ok(false),
        };

        with_conflict_retry(&self.retry, || {
            let current = match target.get(&change.key) {
                Ok(doc) => Some(doc),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };

            match (&current, change.deleted) {
                (None, true) => Ok(false),
                (None, false) => {
                    target.put(Document::new(change.key.clone(), change.payload.clone()))?;
                    Ok(true)
                }
                (Some(existing), deleted) => {
                    let target_rev = existing
                        .rev
                        .clone()
                        .ok_or_else(|| StoreError::InvalidRevision(change.key.clone()))?;
                    if !deleted && existing.payload == change.payload {
                        return Ok(false);
                    }
                    if !wins(source_rev, &target_rev) {
                        return Ok(false);
                    }
                    if deleted {
                        target.remove(&change.key, &target_rev)?;
                    } else {
                        target.put(Document::with_rev(
                            change.key.clone(),
                            target_rev,
                            change.payload.clone(),
                        ))?;
                    }
                    Ok(true)
                }
            }
        })
    }
}

/// Whether the source head supersedes the target head.
fn wins(source: &Revision, target: &Revision) -> bool {
    source.generation > target.generation
        || (source.generation == target.generation && source.digest > target.digest)
}

struct LiveSession {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Establishes one-shot or continuous bidirectional sync with a remote
/// replica and surfaces lifecycle events.
///
/// Exactly one live session may be active per replicator; starting a new
/// one cancels and replaces any existing session. The checkpoint survives
/// across sessions, so a restarted live sync resumes where it left off.
pub struct Replicator {
    exchange: Exchange,
    session: Mutex<Option<LiveSession>>,
}

impl Replicator {
    pub fn new(local: Arc<dyn Engine>, remote: Arc<dyn Engine>, options: SyncOptions) -> Self {
        Self {
            exchange: Exchange {
                local,
                remote,
                options,
                retry: RetryPolicy::default(),
                checkpoint: Arc::new(Mutex::new(Checkpoint::default())),
            },
            session: Mutex::new(None),
        }
    }

    /// Current replication bookmark.
    pub fn checkpoint(&self) -> Checkpoint {
        *self.exchange.checkpoint.lock()
    }

    /// Whether a live session is currently running.
    pub fn is_live(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.thread.is_finished())
    }

    /// Synchronous bidirectional exchange; returns once both directions
    /// have drained.
    pub fn one_shot(&self) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        loop {
            let (pushed, push_drained) = self
                .exchange
                .run_direction(SyncDirection::Push)
                .map_err(sync_failure)?;
            let (pulled, pull_drained) = self
                .exchange
                .run_direction(SyncDirection::Pull)
                .map_err(sync_failure)?;

            stats.pushed += pushed;
            stats.pulled += pulled;

            if pushed == 0 && pulled == 0 && push_drained && pull_drained {
                break;
            }
        }
        tracing::debug!(pushed = stats.pushed, pulled = stats.pulled, "one-shot sync drained");
        Ok(stats)
    }

    /// Start a continuous bidirectional session. Any existing session is
    /// cancelled and replaced.
    pub fn start_live(&self) -> SyncHandle {
        self.stop_live();

        let (sender, receiver) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let exchange = self.exchange.clone();

        let thread = std::thread::spawn(move || {
            run_live(exchange, stop_rx, sender);
        });

        *self.session.lock() = Some(LiveSession {
            stop: stop_tx.clone(),
            thread,
        });

        SyncHandle {
            receiver,
            stop: stop_tx,
        }
    }

    /// Cancel the live session and release the handle. Subsequent calls
    /// are no-ops.
    pub fn stop_live(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            let _ = session.stop.try_send(());
            let _ = session.thread.join();
        }
    }
}

impl Drop for Replicator {
    fn drop(&mut self) {
        self.stop_live();
    }
}

fn sync_failure(e: StoreError) -> StoreError {
    StoreError::SyncFailure(e.to_string())
}

/// Interruptible wait; true when a stop was signalled (or every stop
/// sender is gone).
fn wait_or_stop(stop: &Receiver<()>, timeout: Duration) -> bool {
    !matches!(stop.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

/// Body of the live session thread. Idle and reconnect waits listen on
/// the stop channel, so cancellation never waits out a backoff.
fn run_live(exchange: Exchange, stop: Receiver<()>, events: Sender<SyncEvent>) {
    let mut stats = SyncStats::default();
    let mut active = false;
    let mut failures = 0u32;

    loop {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            // Stop requested, or every stop sender is gone.
            _ => {
                let _ = events.send(SyncEvent::Complete { stats });
                return;
            }
        }

        let cycle = exchange
            .run_direction(SyncDirection::Push)
            .and_then(|push| exchange.run_direction(SyncDirection::Pull).map(|pull| (push, pull)));

        match cycle {
            Ok(((pushed, push_drained), (pulled, pull_drained))) => {
                failures = 0;

                if pushed + pulled > 0 {
                    if !active {
                        let _ = events.send(SyncEvent::Active);
                        active = true;
                    }
                    if pushed > 0 {
                        let _ = events.send(SyncEvent::Change {
                            direction: SyncDirection::Push,
                            count: pushed,
                        });
                    }
                    if pulled > 0 {
                        let _ = events.send(SyncEvent::Change {
                            direction: SyncDirection::Pull,
                            count: pulled,
                        });
                    }
                    stats.pushed += pushed;
                    stats.pulled += pulled;
                } else if push_drained && pull_drained {
                    if active {
                        let _ = events.send(SyncEvent::Paused);
                        active = false;
                    }
                    if wait_or_stop(&stop, exchange.options.poll_interval) {
                        let _ = events.send(SyncEvent::Complete { stats });
                        return;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                let _ = events.send(SyncEvent::Error {
                    reason: e.to_string(),
                });
                if failures >= exchange.options.max_failures {
                    tracing::warn!(failures, "live sync transport unrecoverable, stopping");
                    return;
                }
                let backoff = exchange.options.retry_delay * 2u32.saturating_pow(failures.min(6));
                tracing::debug!(failures, ?backoff, "live sync error, reconnecting");
                if wait_or_stop(&stop, backoff) {
                    let _ = events.send(SyncEvent::Complete { stats });
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use serde_json::json;

    fn engines() -> (Arc<MemoryEngine>, Arc<MemoryEngine>) {
        (Arc::new(MemoryEngine::new()), Arc::new(MemoryEngine::new()))
    }

    #[test]
    fn test_wins_prefers_higher_generation() {
        let low = Revision { generation: 2, digest: "ff".into() };
        let high = Revision { generation: 3, digest: "00".into() };
        assert!(wins(&high, &low));
        assert!(!wins(&low, &high));
    }

    #[test]
    fn test_wins_breaks_generation_ties_by_digest() {
        let a = Revision { generation: 2, digest: "0a".into() };
        let b = Revision { generation: 2, digest: "0b".into() };
        assert!(wins(&b, &a));
        assert!(!wins(&a, &b));
    }

    #[test]
    fn test_one_shot_drains_both_directions() {
        let (local, remote) = engines();
        local.put(Document::new("todo_l", json!({"side": "local"}))).unwrap();
        remote.put(Document::new("todo_r", json!({"side": "remote"}))).unwrap();

        let replicator = Replicator::new(local.clone(), remote.clone(), SyncOptions::default());
        let stats = replicator.one_shot().unwrap();

        assert_eq!(stats.pushed, 1);
        assert_eq!(stats.pulled, 1);
        assert_eq!(remote.get("todo_l").unwrap().payload, json!({"side": "local"}));
        assert_eq!(local.get("todo_r").unwrap().payload, json!({"side": "remote"}));
    }

    #[test]
    fn test_one_shot_is_idempotent_via_checkpoint() {
        let (local, remote) = engines();
        local.put(Document::new("todo_1", json!({"n": 1}))).unwrap();

        let replicator = Replicator::new(local, remote, SyncOptions::default());
        let first = replicator.one_shot().unwrap();
        assert_eq!(first.pushed, 1);

        let second = replicator.one_shot().unwrap();
        assert_eq!(second, SyncStats::default());
        assert!(replicator.checkpoint().push_seq > 0);
    }

    #[test]
    fn test_deletes_replicate() {
        let (local, remote) = engines();
        let rev = local.put(Document::new("todo_1", json!({"n": 1}))).unwrap();

        let replicator = Replicator::new(local.clone(), remote.clone(), SyncOptions::default());
        replicator.one_shot().unwrap();
        assert!(remote.get("todo_1").is_ok());

        local.remove("todo_1", &rev).unwrap();
        replicator.one_shot().unwrap();
        assert!(remote.get("todo_1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_conflicting_edits_converge() {
        let (local, remote) = engines();
        let l_rev = local.put(Document::new("todo_1", json!({"v": 0}))).unwrap();
        let replicator = Replicator::new(local.clone(), remote.clone(), SyncOptions::default());
        replicator.one_shot().unwrap();

        // Both sides edit independently; local edits twice, so it wins on
        // generation.
        let l_rev = local
            .put(Document::with_rev("todo_1", l_rev, json!({"v": "local-1"})))
            .unwrap();
        local
            .put(Document::with_rev("todo_1", l_rev, json!({"v": "local-2"})))
            .unwrap();
        let r_rev = remote.get("todo_1").unwrap().rev.unwrap();
        remote
            .put(Document::with_rev("todo_1", r_rev, json!({"v": "remote"})))
            .unwrap();

        replicator.one_shot().unwrap();
        assert_eq!(local.get("todo_1").unwrap().payload, json!({"v": "local-2"}));
        assert_eq!(remote.get("todo_1").unwrap().payload, json!({"v": "local-2"}));
    }

    #[test]
    fn test_edit_resurrects_concurrently_deleted_document() {
        let (local, remote) = engines();
        let rev = local.put(Document::new("todo_1", json!({"v": 0}))).unwrap();
        let replicator = Replicator::new(local.clone(), remote.clone(), SyncOptions::default());
        replicator.one_shot().unwrap();

        // Local deletes while the remote keeps editing past the
        // tombstone's generation.
        local.remove("todo_1", &rev).unwrap();
        let r_rev = remote.get("todo_1").unwrap().rev.unwrap();
        let r_rev = remote
            .put(Document::with_rev("todo_1", r_rev, json!({"v": 1})))
            .unwrap();
        remote
            .put(Document::with_rev("todo_1", r_rev, json!({"v": 2})))
            .unwrap();

        replicator.one_shot().unwrap();
        // The edit wins on both replicas; the local copy is recreated.
        assert_eq!(local.get("todo_1").unwrap().payload, json!({"v": 2}));
        assert_eq!(remote.get("todo_1").unwrap().payload, json!({"v": 2}));
    }
}
