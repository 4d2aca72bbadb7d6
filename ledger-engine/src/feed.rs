//! Committed-transaction feed
//!
//! External collaborators (the advisory/audit analyzer, dashboards)
//! subscribe to transaction records as they commit. Publishing is
//! fire-and-forget: no subscriber, a full buffer, or a slow consumer never
//! blocks or fails a commit, and a lagging subscriber observes a lag error
//! rather than stalling the ledger.

use crate::types::TransactionRecord;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Broadcast fan-out of committed transaction records
#[derive(Debug, Clone)]
pub struct TransactionFeed {
    sender: broadcast::Sender<TransactionRecord>,
}

impl TransactionFeed {
    /// Create a feed with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a committed record; never blocks, never fails the caller
    pub(crate) fn publish(&self, record: &TransactionRecord) {
        // send only errors when there are no subscribers
        let _ = self.sender.send(record.clone());
    }

    /// Subscribe to records committed after this call
    pub fn subscribe(&self) -> BroadcastStream<TransactionRecord> {
        BroadcastStream::new(self.sender.subscribe())
    }
}
