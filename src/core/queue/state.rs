use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::core::message::{current_timestamp, Message, MAX_PRIORITY};
use crate::core::queue::Queue;
use crate::core::selector::Selector;

/// A message together with its send sequence number.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub(crate) seq: u64,
    pub(crate) message: Message,
}

/// Delivery gate checked by a blocked take on every wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Open,
    /// Connection stopped: keep waiting without consuming.
    Paused,
    /// Session, receiver or connection closed.
    Closed,
}

#[derive(Debug)]
pub(crate) enum TakeOutcome {
    Delivered(Envelope),
    TimedOut,
    Interrupted,
    QueueRemoved,
}

const LEVELS: usize = MAX_PRIORITY as usize + 1;

/// FIFO of one priority level. The first `requeued` entries were put back
/// at the head and stay ordered by send sequence.
#[derive(Debug, Default)]
struct Bucket {
    entries: VecDeque<Envelope>,
    requeued: usize,
}

impl Bucket {
    fn push_head(&mut self, envelope: Envelope) {
        let idx = self
            .entries
            .range(..self.requeued)
            .position(|e| e.seq > envelope.seq)
            .unwrap_or(self.requeued);
        self.entries.insert(idx, envelope);
        self.requeued += 1;
    }

    fn remove(&mut self, idx: usize) -> Option<Envelope> {
        let envelope = self.entries.remove(idx)?;
        if idx < self.requeued {
            self.requeued -= 1;
        }
        Some(envelope)
    }

    /// First entry matching `selector`. Expired entries passed on the way
    /// are dropped and counted in `purged`.
    fn take_matching(&mut self, selector: &Selector, now_ms: u64, purged: &mut usize) -> Option<Envelope> {
        let mut idx = 0;
        while idx < self.entries.len() {
            let message = &self.entries[idx].message;
            if message.is_expired(now_ms) {
                self.remove(idx);
                *purged += 1;
            } else if selector.matches(message) {
                return self.remove(idx);
            } else {
                idx += 1;
            }
        }
        None
    }
}

/// Ordered contents of one queue, one FIFO bucket per priority level.
/// Callers hold the queue lock.
#[derive(Debug, Default)]
pub(crate) struct QueueEntries {
    buckets: [Bucket; LEVELS],
    len: usize,
}

impl QueueEntries {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn bucket(&mut self, envelope: &Envelope) -> &mut Bucket {
        let level = usize::from(envelope.message.priority().min(MAX_PRIORITY));
        &mut self.buckets[level]
    }

    pub(crate) fn push_tail(&mut self, envelope: Envelope) {
        self.bucket(&envelope).entries.push_back(envelope);
        self.len += 1;
    }

    /// Inserts into the requeued prefix of the message's priority level,
    /// keeping that prefix ordered by send sequence.
    pub(crate) fn push_head(&mut self, envelope: Envelope) {
        self.bucket(&envelope).push_head(envelope);
        self.len += 1;
    }

    /// Puts back a message that was taken but never handed to a caller.
    pub(crate) fn restore_front(&mut self, envelope: Envelope) {
        let redelivered = envelope.message.is_redelivered();
        let bucket = self.bucket(&envelope);
        if redelivered {
            bucket.push_head(envelope);
        } else {
            let idx = bucket.requeued;
            bucket.entries.insert(idx, envelope);
        }
        self.len += 1;
    }

    /// Removes and returns the first matching entry of the highest priority
    /// level that has one. Expired entries are dropped as the scan passes
    /// them.
    pub(crate) fn take_matching(&mut self, selector: &Selector, now_ms: u64) -> Option<Envelope> {
        let mut purged = 0;
        let mut taken = None;
        for bucket in self.buckets.iter_mut().rev() {
            if bucket.entries.is_empty() {
                continue;
            }
            taken = bucket.take_matching(selector, now_ms, &mut purged);
            if taken.is_some() {
                break;
            }
        }

        if purged > 0 {
            debug!(purged, "dropped expired messages");
        }
        self.len -= purged + usize::from(taken.is_some());
        taken
    }

    /// Point-in-time copy of the live entries matching `selector`, in
    /// delivery order.
    pub(crate) fn snapshot_matching(&self, selector: &Selector, now_ms: u64) -> Vec<Message> {
        self.buckets
            .iter()
            .rev()
            .flat_map(|bucket| bucket.entries.iter())
            .filter(|e| !e.message.is_expired(now_ms) && selector.matches(&e.message))
            .map(|e| e.message.clone())
            .collect()
    }
}

/// One registered queue: its entries plus the condition variable blocked
/// receivers wait on.
#[derive(Debug)]
pub(crate) struct QueueState {
    name: Queue,
    pub(crate) entries: Mutex<QueueEntries>,
    available: Condvar,
    removed: AtomicBool,
}

impl QueueState {
    pub(crate) fn new(name: Queue) -> Self {
        Self {
            name,
            entries: Mutex::new(QueueEntries::default()),
            available: Condvar::new(),
            removed: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &Queue {
        &self.name
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
        self.wake();
    }

    /// Wakes every blocked take. The lock is taken first so a waiter that
    /// has checked its gate but not yet parked cannot miss the signal.
    pub(crate) fn wake(&self) {
        drop(self.entries.lock());
        self.available.notify_all();
    }

    /// Notifies waiters after the caller has already released the lock.
    pub(crate) fn notify(&self) {
        self.available.notify_all();
    }

    /// Blocks until a matching message can be taken, `deadline` passes, the
    /// gate closes or the queue is removed. `None` waits without limit.
    pub(crate) fn wait_take(
        &self,
        selector: &Selector,
        deadline: Option<Instant>,
        gate: &dyn Fn() -> Gate,
    ) -> TakeOutcome {
        let mut entries = self.entries.lock();
        loop {
            if self.is_removed() {
                return TakeOutcome::QueueRemoved;
            }
            match gate() {
                Gate::Closed => return TakeOutcome::Interrupted,
                Gate::Open => {
                    if let Some(envelope) = entries.take_matching(selector, current_timestamp()) {
                        return TakeOutcome::Delivered(envelope);
                    }
                }
                Gate::Paused => {}
            }

            match deadline {
                None => self.available.wait(&mut entries),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return TakeOutcome::TimedOut;
                    }
                    // A timeout falls through to one final check above.
                    let _ = self.available.wait_until(&mut entries, deadline);
                }
            }
        }
    }
}
