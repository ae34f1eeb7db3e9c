//! Sessions: the unit of transactional work.
//!
//! A session is a single-threaded context from its caller's point of view,
//! but it can be closed from another thread, which wakes any receive blocked
//! on it. Pending work (buffered sends, provisional deliveries) lives behind
//! one mutex that is never held while waiting on a queue.

mod transaction;

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::browser::QueueBrowser;
use crate::core::connection::ConnectionShared;
use crate::core::error::{JmsError, Result};
use crate::core::message::{next_sequence, Message, SendOptions};
use crate::core::queue::state::{Envelope, Gate, TakeOutcome};
use crate::core::queue::{MessageStore, Queue};
use crate::core::receiver::QueueReceiver;
use crate::core::selector::Selector;
use crate::core::sender::QueueSender;
use transaction::PendingWork;

/// How deliveries are confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcknowledgeMode {
    /// Delivery completes when `receive` returns.
    #[default]
    Auto,
    /// Deliveries stay provisional until [`Session::acknowledge`].
    Client,
    /// Like `Auto`; duplicates are tolerated by the consumer.
    DupsOk,
    /// Deliveries complete on [`Session::commit`]. Implied by a transacted
    /// session.
    Transacted,
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    id: Uuid,
    ack_mode: AcknowledgeMode,
    connection: Arc<ConnectionShared>,
    closed: AtomicBool,
    work: Mutex<PendingWork>,
    /// Queues this session's receivers may be blocked on.
    consumed: Mutex<BTreeSet<Queue>>,
}

impl SessionInner {
    fn store(&self) -> &MessageStore {
        &self.connection.store
    }

    /// Marks the session closed and undoes its open work. Returns `false` if
    /// it was already closed.
    fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let (discarded, returns) = {
            let mut work = self.work.lock();
            (work.discard_sends(), work.drain_returns())
        };
        let returned = returns.returns.len();
        if let Err(err) = self.store().apply(returns) {
            warn!(session = %self.id, error = %err, "failed to return deliveries on close");
        }

        let consumed: Vec<Queue> = self.consumed.lock().iter().cloned().collect();
        for queue in &consumed {
            self.store().wake(queue);
        }

        info!(session = %self.id, discarded, returned, "session closed");
        true
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A JMS-style queue session. Cloning yields another handle to the same
/// session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        connection: Arc<ConnectionShared>,
        transacted: bool,
        ack_mode: AcknowledgeMode,
    ) -> Result<Self> {
        let ack_mode = match (transacted, ack_mode) {
            (true, _) => AcknowledgeMode::Transacted,
            (false, AcknowledgeMode::Transacted) => {
                return Err(JmsError::IllegalState(
                    "acknowledge mode Transacted requires a transacted session".to_string(),
                ))
            }
            (false, mode) => mode,
        };

        let inner = Arc::new(SessionInner {
            id: Uuid::new_v4(),
            ack_mode,
            connection,
            closed: AtomicBool::new(false),
            work: Mutex::new(PendingWork::default()),
            consumed: Mutex::new(BTreeSet::new()),
        });
        debug!(session = %inner.id, ?ack_mode, "session created");
        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn is_transacted(&self) -> bool {
        self.inner.ack_mode == AcknowledgeMode::Transacted
    }

    pub fn acknowledge_mode(&self) -> AcknowledgeMode {
        self.inner.ack_mode
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn store(&self) -> &MessageStore {
        self.inner.store()
    }

    pub(crate) fn shared_store(&self) -> Arc<MessageStore> {
        Arc::clone(&self.inner.connection.store)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(JmsError::closed("session"));
        }
        Ok(())
    }

    pub fn create_message(&self) -> Result<Message> {
        self.ensure_open()?;
        Ok(Message::new())
    }

    pub fn create_text_message(&self, text: impl Into<String>) -> Result<Message> {
        self.ensure_open()?;
        Ok(Message::text(text))
    }

    pub fn create_bytes_message(&self, payload: impl Into<Bytes>) -> Result<Message> {
        self.ensure_open()?;
        Ok(Message::bytes(payload))
    }

    /// Handle for a declared queue.
    pub fn create_queue(&self, name: &str) -> Result<Queue> {
        self.ensure_open()?;
        let queue = Queue::new(name);
        if !self.store().contains(&queue) {
            return Err(JmsError::unknown_queue(name));
        }
        Ok(queue)
    }

    /// Checks that `destination` is present and names a declared queue.
    pub(crate) fn validate_destination(&self, destination: Option<&Queue>) -> Result<Queue> {
        let queue = destination.ok_or_else(JmsError::missing_destination)?;
        if !self.store().contains(queue) {
            return Err(JmsError::unknown_queue(queue.name()));
        }
        Ok(queue.clone())
    }

    pub fn create_sender(&self, destination: Option<&Queue>) -> Result<QueueSender> {
        self.ensure_open()?;
        let queue = self.validate_destination(destination)?;
        Ok(QueueSender::new(
            self.clone(),
            queue,
            self.inner.connection.defaults,
        ))
    }

    /// Both the destination and the selector are validated here, before any
    /// message is consumed.
    pub fn create_receiver(
        &self,
        destination: Option<&Queue>,
        selector: Option<&str>,
    ) -> Result<QueueReceiver> {
        self.ensure_open()?;
        let queue = self.validate_destination(destination)?;
        let selector = Selector::parse(selector)?;
        self.inner.consumed.lock().insert(queue.clone());
        debug!(session = %self.inner.id, queue = %queue, %selector, "receiver created");
        Ok(QueueReceiver::new(self.clone(), queue, selector))
    }

    pub fn create_browser(
        &self,
        destination: Option<&Queue>,
        selector: Option<&str>,
    ) -> Result<QueueBrowser> {
        self.ensure_open()?;
        let queue = self.validate_destination(destination)?;
        let selector = Selector::parse(selector)?;
        Ok(QueueBrowser::new(self.clone(), queue, selector))
    }

    /// Sends with the connection's producer defaults.
    pub fn send(&self, destination: Option<&Queue>, message: Message) -> Result<()> {
        self.ensure_open()?;
        let queue = self.validate_destination(destination)?;
        self.send_with(&queue, message, &self.inner.connection.defaults)
    }

    pub(crate) fn send_with(&self, queue: &Queue, mut message: Message, options: &SendOptions) -> Result<()> {
        self.ensure_open()?;
        if !self.store().contains(queue) {
            return Err(JmsError::unknown_queue(queue.name()));
        }

        message.stamp(queue, options);
        let envelope = Envelope {
            seq: next_sequence(),
            message,
        };

        if self.is_transacted() {
            let mut work = self.inner.work.lock();
            work.buffer_send(queue.clone(), envelope);
            debug!(session = %self.inner.id, queue = %queue, pending = work.pending_sends(), "send buffered");
            Ok(())
        } else {
            self.store().push_tail(queue, envelope)
        }
    }

    /// Takes the next message matching `selector` from `queue`, waiting until
    /// `deadline` (`None` waits without limit). Timeout yields `Ok(None)`.
    pub(crate) fn receive_from(
        &self,
        queue: &Queue,
        selector: &Selector,
        deadline: Option<Instant>,
        receiver_closed: &AtomicBool,
    ) -> Result<Option<Message>> {
        self.ensure_open()?;

        let gate = || {
            if receiver_closed.load(Ordering::Acquire) || self.is_closed() {
                Gate::Closed
            } else {
                self.inner.connection.gate()
            }
        };

        let envelope = match self.store().wait_take(queue, selector, deadline, &gate)? {
            TakeOutcome::Delivered(envelope) => envelope,
            TakeOutcome::TimedOut => return Ok(None),
            TakeOutcome::QueueRemoved => return Err(JmsError::unknown_queue(queue.name())),
            TakeOutcome::Interrupted => return Err(self.interruption(receiver_closed)),
        };

        let message = envelope.message.clone();
        match self.inner.ack_mode {
            AcknowledgeMode::Auto | AcknowledgeMode::DupsOk => {}
            AcknowledgeMode::Client | AcknowledgeMode::Transacted => {
                let mut work = self.inner.work.lock();
                // close() sets the flag before taking this lock
                if self.is_closed() {
                    drop(work);
                    self.store().restore(queue, envelope);
                    return Err(JmsError::closed("session"));
                }
                work.record_delivery(queue.clone(), envelope);
            }
        }
        Ok(Some(message))
    }

    fn interruption(&self, receiver_closed: &AtomicBool) -> JmsError {
        if self.is_closed() {
            JmsError::closed("session")
        } else if self.inner.connection.is_closed() {
            JmsError::closed("connection")
        } else if receiver_closed.load(Ordering::Acquire) {
            JmsError::closed("receiver")
        } else {
            JmsError::IllegalState("receive interrupted".to_string())
        }
    }

    /// Publishes every buffered send in send order and makes every
    /// provisional delivery permanent, as one atomic step.
    ///
    /// If the sends cannot be applied the unit of work is rolled back and
    /// `TransactionRolledBack` is returned.
    #[tracing::instrument(skip(self), fields(session = %self.inner.id))]
    pub fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.is_transacted() {
            return Err(JmsError::IllegalState(
                "commit called on a non-transacted session".to_string(),
            ));
        }

        let mut work = self.inner.work.lock();
        let sends = work.drain_sends();
        let sent = sends.sends.len();

        match self.store().apply(sends) {
            Ok(()) => {
                let acknowledged = work.settle_deliveries();
                debug!(sent, acknowledged, "transaction committed");
                Ok(())
            }
            Err(err) => {
                let returns = work.drain_returns();
                let returned = returns.returns.len();
                self.store().apply(returns)?;
                warn!(error = %err, sent, returned, "commit failed; transaction rolled back");
                Err(JmsError::TransactionRolledBack(err.to_string()))
            }
        }
    }

    /// Discards buffered sends and returns every provisional delivery to the
    /// head of its queue, marked redelivered.
    #[tracing::instrument(skip(self), fields(session = %self.inner.id))]
    pub fn rollback(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.is_transacted() {
            return Err(JmsError::IllegalState(
                "rollback called on a non-transacted session".to_string(),
            ));
        }

        let mut work = self.inner.work.lock();
        let discarded = work.discard_sends();
        let returns = work.drain_returns();
        let returned = returns.returns.len();
        self.store().apply(returns)?;
        debug!(discarded, returned, "transaction rolled back");
        Ok(())
    }

    /// Redelivers unacknowledged messages of a client-acknowledge session.
    /// A no-op for auto and dups-ok sessions.
    pub fn recover(&self) -> Result<()> {
        self.ensure_open()?;
        match self.inner.ack_mode {
            AcknowledgeMode::Transacted => Err(JmsError::IllegalState(
                "recover called on a transacted session".to_string(),
            )),
            AcknowledgeMode::Client => {
                let returns = self.inner.work.lock().drain_returns();
                let returned = returns.returns.len();
                self.store().apply(returns)?;
                debug!(session = %self.inner.id, returned, "session recovered");
                Ok(())
            }
            AcknowledgeMode::Auto | AcknowledgeMode::DupsOk => Ok(()),
        }
    }

    /// Acknowledges every message delivered so far in a client-acknowledge
    /// session.
    pub fn acknowledge(&self) -> Result<()> {
        self.ensure_open()?;
        if self.inner.ack_mode != AcknowledgeMode::Client {
            return Err(JmsError::IllegalState(format!(
                "acknowledge requires client acknowledge mode, session is {:?}",
                self.inner.ack_mode
            )));
        }
        let acknowledged = self.inner.work.lock().settle_deliveries();
        debug!(session = %self.inner.id, acknowledged, "messages acknowledged");
        Ok(())
    }

    /// Closes the session: open work is rolled back (or recovered), blocked
    /// receives wake with `IllegalState`, and every later operation fails
    /// with `IllegalState`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.inner.shutdown();
        Ok(())
    }

    /// Number of buffered sends and provisional deliveries.
    pub fn pending(&self) -> (usize, usize) {
        let work = self.inner.work.lock();
        (work.pending_sends(), work.pending_deliveries())
    }
}
