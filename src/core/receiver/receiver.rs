use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::core::error::{JmsError, Result};
use crate::core::message::Message;
use crate::core::queue::Queue;
use crate::core::selector::Selector;
use crate::core::session::Session;

/// Pulls messages matching a selector from one queue.
///
/// Clones share the same closed flag, so a clone moved to another thread can
/// close the receiver and wake a receive blocked on it.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    session: Session,
    queue: Queue,
    selector: Selector,
    closed: Arc<AtomicBool>,
}

impl QueueReceiver {
    pub(crate) fn new(session: Session, queue: Queue, selector: Selector) -> Self {
        Self {
            session,
            queue,
            selector,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Selector source, `None` for a match-all receiver.
    pub fn message_selector(&self) -> Option<&str> {
        self.selector.source()
    }

    /// Waits up to `timeout` for a matching message. `Ok(None)` on timeout.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>> {
        self.ensure_open()?;
        let deadline = Instant::now().checked_add(timeout);
        self.pull(deadline)
    }

    /// Takes a matching message only if one is available right now.
    pub fn receive_no_wait(&self) -> Result<Option<Message>> {
        self.ensure_open()?;
        self.pull(Some(Instant::now()))
    }

    /// Waits until a matching message arrives or the receiver, its session
    /// or its connection is closed.
    pub fn receive_blocking(&self) -> Result<Message> {
        self.ensure_open()?;
        self.pull(None)?
            .ok_or_else(|| JmsError::IllegalState("receive returned without a message".to_string()))
    }

    /// [`receive`](Self::receive) on tokio's blocking pool.
    pub async fn receive_async(&self, timeout: Duration) -> Result<Option<Message>> {
        let receiver = self.clone();
        tokio::task::spawn_blocking(move || receiver.receive(timeout))
            .await
            .map_err(|err| JmsError::IllegalState(format!("receive task failed: {err}")))?
    }

    /// Later receives fail with `IllegalState`; a receive blocked on this
    /// receiver wakes and fails the same way.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.session.store().wake(&self.queue);
            debug!(target: "receiver", queue = %self.queue, "receiver closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(JmsError::closed("receiver"));
        }
        Ok(())
    }

    fn pull(&self, deadline: Option<Instant>) -> Result<Option<Message>> {
        let message = self
            .session
            .receive_from(&self.queue, &self.selector, deadline, &self.closed)?;
        if let Some(message) = &message {
            trace!(
                target: "receiver",
                queue = %self.queue,
                id = message.message_id().unwrap_or_default(),
                redelivered = message.is_redelivered(),
                "message received"
            );
        }
        Ok(message)
    }
}
