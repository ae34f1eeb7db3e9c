use crate::core::queue::state::Envelope;
use crate::core::queue::store::StoreBatch;
use crate::core::queue::Queue;

/// Work a session has done but not yet made permanent: buffered sends of a
/// transacted session and provisional deliveries awaiting commit or
/// acknowledge.
#[derive(Debug, Default)]
pub(crate) struct PendingWork {
    sends: Vec<(Queue, Envelope)>,
    deliveries: Vec<(Queue, Envelope)>,
}

impl PendingWork {
    pub(crate) fn buffer_send(&mut self, queue: Queue, envelope: Envelope) {
        self.sends.push((queue, envelope));
    }

    pub(crate) fn record_delivery(&mut self, queue: Queue, envelope: Envelope) {
        self.deliveries.push((queue, envelope));
    }

    pub(crate) fn pending_sends(&self) -> usize {
        self.sends.len()
    }

    pub(crate) fn pending_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    /// Buffered sends as a batch, in send order.
    pub(crate) fn drain_sends(&mut self) -> StoreBatch {
        StoreBatch {
            sends: std::mem::take(&mut self.sends),
            returns: Vec::new(),
        }
    }

    /// Provisional deliveries as a batch of returns.
    pub(crate) fn drain_returns(&mut self) -> StoreBatch {
        StoreBatch {
            sends: Vec::new(),
            returns: std::mem::take(&mut self.deliveries),
        }
    }

    /// Forgets buffered sends; they never become visible.
    pub(crate) fn discard_sends(&mut self) -> usize {
        let n = self.sends.len();
        self.sends.clear();
        n
    }

    /// Makes provisional deliveries permanent.
    pub(crate) fn settle_deliveries(&mut self) -> usize {
        let n = self.deliveries.len();
        self.deliveries.clear();
        n
    }
}
