//! Outbox of local changes awaiting push.

use memodeck_protocol::{EntityKind, OpKind, SyncOp};

/// One local mutation queued for push.
///
/// Versions are deliberately absent here: they are assigned at push time
/// from the freshest known server state, so a change can sit in the outbox
/// across many failed cycles without going stale on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    /// Entity the change targets.
    pub entity_id: String,
    /// Kind of that entity.
    pub entity_type: EntityKind,
    /// Kind of mutation.
    pub op: OpKind,
    /// Local wall clock at mutation time, epoch milliseconds.
    pub timestamp: i64,
    /// Entity payload for create/update.
    pub payload: Option<serde_json::Value>,
    /// Opaque change description forwarded to the server untouched.
    pub diff: Option<serde_json::Value>,
}

impl PendingOp {
    /// Converts to a wire operation with a push-time version.
    pub fn into_sync_op(self, version: u64) -> SyncOp {
        SyncOp {
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            version: Some(version),
            op: self.op,
            timestamp: self.timestamp,
            payload: self.payload,
            diff: self.diff,
        }
    }
}

/// FIFO queue of unpushed local changes.
///
/// Entries leave the queue only through [`Outbox::confirm`], after the
/// server acknowledged them. A rejected or failed push leaves the queue
/// exactly as it was.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<PendingOp>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Queues a change.
    pub fn enqueue(&mut self, op: PendingOp) {
        self.pending.push(op);
    }

    /// Returns up to `limit` changes from the front, cloned, in queue order.
    pub fn peek_batch(&self, limit: usize) -> Vec<PendingOp> {
        self.pending.iter().take(limit).cloned().collect()
    }

    /// Removes the first `count` changes after a successful push.
    pub fn confirm(&mut self, count: usize) {
        self.pending.drain(..count.min(self.pending.len()));
    }

    /// Returns the number of queued changes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
