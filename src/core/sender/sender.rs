use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::core::delivery_mode::DeliveryMode;
use crate::core::error::{JmsError, Result};
use crate::core::message::{Message, SendOptions, MAX_PRIORITY};
use crate::core::queue::Queue;
use crate::core::session::Session;

/// Puts messages on one queue through its session.
///
/// In a transacted session a send is buffered until commit; otherwise the
/// message is visible to receivers as soon as `send` returns.
#[derive(Debug)]
pub struct QueueSender {
    session: Session,
    queue: Queue,
    options: SendOptions,
    closed: AtomicBool,
}

impl QueueSender {
    pub(crate) fn new(session: Session, queue: Queue, options: SendOptions) -> Self {
        Self {
            session,
            queue,
            options,
            closed: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn priority(&self) -> u8 {
        self.options.priority
    }

    /// Priority stamped on later sends, 0 (lowest) to 9.
    pub fn set_priority(&mut self, priority: u8) -> Result<()> {
        if priority > MAX_PRIORITY {
            return Err(JmsError::IllegalState(format!(
                "priority {priority} is outside 0..={MAX_PRIORITY}"
            )));
        }
        self.options.priority = priority;
        Ok(())
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.options.delivery_mode
    }

    pub fn set_delivery_mode(&mut self, mode: DeliveryMode) {
        self.options.delivery_mode = mode;
    }

    /// Zero means messages never expire.
    pub fn time_to_live(&self) -> Duration {
        Duration::from_millis(self.options.time_to_live_ms)
    }

    pub fn set_time_to_live(&mut self, ttl: Duration) {
        self.options.time_to_live_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    }

    pub fn send(&self, message: Message) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(JmsError::closed("sender"));
        }
        self.session.send_with(&self.queue, message, &self.options)?;
        debug!(target: "sender", queue = %self.queue, "message sent");
        Ok(())
    }

    /// Later sends fail with `IllegalState`. Closing twice is a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
