use dashmap::DashMap;
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::error::{JmsError, Result};
use crate::core::message::{current_timestamp, next_sequence, Message};
use crate::core::queue::state::{Envelope, Gate, QueueEntries, QueueState, TakeOutcome};
use crate::core::queue::Queue;
use crate::core::selector::Selector;

/// Property stamped on dead-lettered messages naming the queue they left.
pub const ORIGINAL_QUEUE_PROPERTY: &str = "JMS_BLIPQ_OriginalQueue";

/// Where messages go once they have been returned too many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPolicy {
    pub queue: Queue,
    /// A returned message whose delivery count reaches this value is moved
    /// to `queue`. 0 disables the limit.
    pub max_delivery_attempts: u32,
}

/// Sends and returns applied to the store as one atomic step.
#[derive(Debug, Default)]
pub(crate) struct StoreBatch {
    /// Appended at the tail of their queue, in this order.
    pub(crate) sends: Vec<(Queue, Envelope)>,
    /// Returned to the head of their queue, marked redelivered. Sessions
    /// submit sends and returns in separate batches.
    pub(crate) returns: Vec<(Queue, Envelope)>,
}

impl StoreBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.sends.is_empty() && self.returns.is_empty()
    }
}

enum Placement {
    Head,
    Tail,
}

/// [`MessageStore`] holds every declared queue.
///
/// The registry is a `DashMap`; each queue's contents sit behind that
/// queue's own mutex, so independent queues never contend.
#[derive(Debug, Default)]
pub struct MessageStore {
    queues: DashMap<Queue, Arc<QueueState>>,
    dead_letter: Option<DeadLetterPolicy>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a dead-letter policy, declaring its queue.
    pub fn with_dead_letter(mut self, policy: DeadLetterPolicy) -> Self {
        self.declare_queue(policy.queue.name());
        info!(
            queue = %policy.queue,
            max_delivery_attempts = policy.max_delivery_attempts,
            "dead-letter policy installed"
        );
        self.dead_letter = Some(policy);
        self
    }

    pub fn dead_letter_policy(&self) -> Option<&DeadLetterPolicy> {
        self.dead_letter.as_ref()
    }

    /// Returns the queue, creating it if it doesn't exist yet.
    pub fn declare_queue(&self, name: &str) -> Queue {
        let queue = Queue::new(name);
        self.queues.entry(queue.clone()).or_insert_with(|| {
            debug!(queue = %queue, "declaring queue");
            Arc::new(QueueState::new(queue.clone()))
        });
        queue
    }

    /// Removes a queue and drops its messages. Receivers blocked on it are
    /// woken. Returns `false` if the queue was unknown.
    pub fn remove_queue(&self, queue: &Queue) -> bool {
        match self.queues.remove(queue) {
            Some((_, state)) => {
                state.mark_removed();
                info!(queue = %state.name(), dropped = state.entries.lock().len(), "queue removed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, queue: &Queue) -> bool {
        self.queues.contains_key(queue)
    }

    /// Names of all declared queues, sorted.
    pub fn queue_names(&self) -> Vec<Queue> {
        let mut names: Vec<Queue> = self.queues.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of messages currently enqueued (in-flight deliveries excluded).
    pub fn depth(&self, queue: &Queue) -> Option<usize> {
        self.queues.get(queue).map(|state| state.entries.lock().len())
    }

    /// Appends at the tail. A message that was never sent is stamped with
    /// the default send options first.
    pub fn enqueue_tail(&self, queue: &Queue, mut message: Message) -> Result<()> {
        message.stamp_if_unsent(queue);
        self.push_tail(
            queue,
            Envelope {
                seq: next_sequence(),
                message,
            },
        )
    }

    /// Inserts ahead of every message of the same priority that was not put
    /// back at the head. Successive head inserts keep their call order.
    pub fn enqueue_head(&self, queue: &Queue, mut message: Message) -> Result<()> {
        message.stamp_if_unsent(queue);
        let state = self.resolve(queue)?;
        state.entries.lock().push_head(Envelope {
            seq: next_sequence(),
            message,
        });
        state.notify();
        Ok(())
    }

    /// Non-destructive snapshot of the matching messages, in delivery order.
    pub fn peek_matching(&self, queue: &Queue, selector: &Selector) -> Result<Vec<Message>> {
        let state = self.resolve(queue)?;
        let entries = state.entries.lock();
        Ok(entries.snapshot_matching(selector, current_timestamp()))
    }

    /// Removes and returns the first matching message, if any.
    pub fn take_matching(&self, queue: &Queue, selector: &Selector) -> Result<Option<Message>> {
        let state = self.resolve(queue)?;
        let mut entries = state.entries.lock();
        Ok(entries
            .take_matching(selector, current_timestamp())
            .map(|e| e.message))
    }

    pub(crate) fn resolve(&self, queue: &Queue) -> Result<Arc<QueueState>> {
        self.queues
            .get(queue)
            .map(|entry| Arc::clone(&*entry))
            .ok_or_else(|| JmsError::unknown_queue(queue.name()))
    }

    pub(crate) fn push_tail(&self, queue: &Queue, envelope: Envelope) -> Result<()> {
        let state = self.resolve(queue)?;
        state.entries.lock().push_tail(envelope);
        state.notify();
        Ok(())
    }

    /// Returns an envelope that was taken but never delivered to a caller.
    pub(crate) fn restore(&self, queue: &Queue, envelope: Envelope) {
        match self.resolve(queue) {
            Ok(state) => {
                state.entries.lock().restore_front(envelope);
                state.notify();
            }
            Err(_) => warn!(queue = %queue, "queue vanished; undelivered message dropped"),
        }
    }

    pub(crate) fn wait_take(
        &self,
        queue: &Queue,
        selector: &Selector,
        deadline: Option<Instant>,
        gate: &dyn Fn() -> Gate,
    ) -> Result<TakeOutcome> {
        let state = self.resolve(queue)?;
        Ok(state.wait_take(selector, deadline, gate))
    }

    /// Wakes blocked receivers on `queue` so they re-check their gate.
    pub(crate) fn wake(&self, queue: &Queue) {
        if let Some(state) = self.queues.get(queue).map(|e| Arc::clone(&*e)) {
            state.wake();
        }
    }

    pub(crate) fn wake_all(&self) {
        let states: Vec<Arc<QueueState>> = self.queues.iter().map(|e| Arc::clone(e.value())).collect();
        for state in states {
            state.wake();
        }
    }

    /// Applies `batch` atomically.
    ///
    /// Every touched queue is locked in ascending name order and all of them
    /// are held while the batch is written, so no other session can observe
    /// a partial result. If any send targets an unknown queue nothing is
    /// applied. Returns whose queue has gone are dead-lettered if possible,
    /// dropped otherwise.
    pub(crate) fn apply(&self, batch: StoreBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut touched: BTreeMap<Queue, Arc<QueueState>> = BTreeMap::new();
        for (queue, _) in &batch.sends {
            if !touched.contains_key(queue) {
                touched.insert(queue.clone(), self.resolve(queue)?);
            }
        }

        let mut placed: Vec<(Queue, Envelope, Placement)> = Vec::with_capacity(batch.returns.len());
        for (queue, mut envelope) in batch.returns {
            envelope.message.mark_redelivered();
            let (target, placement) = match self.dead_letter_target(&envelope.message) {
                Some(dlq) => {
                    warn!(
                        queue = %queue,
                        dead_letter_queue = %dlq,
                        delivery_count = envelope.message.delivery_count(),
                        "delivery attempts exhausted; moving message to dead-letter queue"
                    );
                    envelope
                        .message
                        .set_property(ORIGINAL_QUEUE_PROPERTY, queue.name());
                    (dlq, Placement::Tail)
                }
                None => (queue, Placement::Head),
            };

            let target = if self.contains(&target) {
                target
            } else if let Some(dlq) = self.dead_letter.as_ref().map(|p| p.queue.clone()) {
                warn!(queue = %target, "queue vanished; moving returned message to dead-letter queue");
                envelope
                    .message
                    .set_property(ORIGINAL_QUEUE_PROPERTY, target.name());
                dlq
            } else {
                warn!(queue = %target, "queue vanished; returned message dropped");
                continue;
            };

            if !touched.contains_key(&target) {
                match self.resolve(&target) {
                    Ok(state) => {
                        touched.insert(target.clone(), state);
                    }
                    Err(_) => {
                        warn!(queue = %target, "queue vanished; returned message dropped");
                        continue;
                    }
                }
            }
            placed.push((target, envelope, placement));
        }

        {
            // BTreeMap iteration is sorted, which fixes the lock order.
            let mut guards: BTreeMap<&Queue, MutexGuard<'_, QueueEntries>> = touched
                .iter()
                .map(|(queue, state)| (queue, state.entries.lock()))
                .collect();

            for (queue, _) in &batch.sends {
                if touched.get(queue).map_or(true, |state| state.is_removed()) {
                    return Err(JmsError::unknown_queue(queue.name()));
                }
            }

            for (queue, envelope) in batch.sends {
                if let Some(entries) = guards.get_mut(&queue) {
                    entries.push_tail(envelope);
                }
            }
            for (queue, envelope, placement) in placed {
                if let Some(entries) = guards.get_mut(&queue) {
                    match placement {
                        Placement::Head => entries.push_head(envelope),
                        Placement::Tail => entries.push_tail(envelope),
                    }
                }
            }
        }

        for state in touched.values() {
            state.notify();
        }
        Ok(())
    }

    fn dead_letter_target(&self, message: &Message) -> Option<Queue> {
        let policy = self.dead_letter.as_ref()?;
        if policy.max_delivery_attempts == 0 || message.delivery_count() < policy.max_delivery_attempts {
            return None;
        }
        Some(policy.queue.clone())
    }
}
