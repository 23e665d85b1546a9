//! Replication options, lifecycle events, and session handles.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batching and reconnection parameters for a sync session.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Documents per change-feed page. Default: 100.
    pub batch_size: usize,

    /// Pages drained per direction per cycle before lifecycle events
    /// are emitted and the checkpoint advances. Default: 5.
    pub batches_limit: usize,

    /// How long a live session idles once caught up before polling the
    /// change feeds again.
    pub poll_interval: Duration,

    /// Base delay before reconnecting after a transient failure;
    /// doubles per consecutive failure.
    pub retry_delay: Duration,

    /// Consecutive failures after which the transport is considered
    /// unrecoverable and the live session stops.
    pub max_failures: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batches_limit: 5,
            poll_interval: Duration::from_millis(500),
            retry_delay: Duration::from_secs(1),
            max_failures: 10,
        }
    }
}

/// Which way a batch of documents moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Local to remote.
    Push,
    /// Remote to local.
    Pull,
}

/// Totals for a sync session or one-shot exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Documents written to the remote.
    pub pushed: u64,
    /// Documents written locally.
    pub pulled: u64,
}

/// Lifecycle events emitted by a live session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Data is flowing.
    Active,

    /// Caught up with the remote, idling.
    Paused,

    /// A batch was applied.
    Change {
        direction: SyncDirection,
        /// Documents written to the receiving side.
        count: u64,
    },

    /// A recoverable failure; the session continues unless the failure
    /// streak exceeds the configured limit.
    Error { reason: String },

    /// Session ended: one-shot drained, or a live session was
    /// explicitly cancelled.
    Complete { stats: SyncStats },
}

/// How far replication has progressed, per direction. Kept by the
/// replicator so a restarted live session resumes instead of rescanning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Local change sequence already pushed.
    pub push_seq: u64,
    /// Remote change sequence already pulled.
    pub pull_seq: u64,
}

/// Handle to a live sync session.
///
/// Dropping the handle does not stop the session; call [`SyncHandle::stop`]
/// or [`crate::replication::Replicator::stop_live`].
pub struct SyncHandle {
    pub(crate) receiver: crossbeam_channel::Receiver<SyncEvent>,
    pub(crate) stop: crossbeam_channel::Sender<()>,
}

impl SyncHandle {
    /// Receive the next lifecycle event (blocking).
    pub fn recv(&self) -> Result<SyncEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SyncEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<SyncEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Ask the session to wind down. Idempotent; wakes the session out
    /// of any idle or reconnect wait, and the session emits `Complete`
    /// once it exits.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }
}
