//! Local connection and session factory.
//!
//! A [`Connection`] never talks to a network: it is the in-process handle
//! sessions are created from, plus the start/stop gate JMS puts on message
//! delivery. Connections are created stopped; receivers block without
//! consuming until [`Connection::start`] is called. Sending is allowed
//! either way.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::core::error::{JmsError, Result};
use crate::core::message::SendOptions;
use crate::core::queue::state::Gate;
use crate::core::queue::{DeadLetterPolicy, MessageStore, Queue};
use crate::core::session::{AcknowledgeMode, Session, SessionInner};

/// Creates connections over one shared [`MessageStore`].
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    store: Arc<MessageStore>,
    defaults: SendOptions,
}

impl ConnectionFactory {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self {
            store,
            defaults: SendOptions::default(),
        }
    }

    /// Builds a store from `config`: declares the configured queues and
    /// installs the dead-letter policy, if any.
    pub fn from_config(config: &Config) -> Self {
        let mut store = MessageStore::new();
        if let Some(dlq) = &config.store.dead_letter_queue {
            store = store.with_dead_letter(DeadLetterPolicy {
                queue: Queue::new(dlq.as_str()),
                max_delivery_attempts: config.store.max_delivery_attempts,
            });
        }
        for name in &config.store.queues {
            store.declare_queue(name);
        }
        info!(queues = config.store.queues.len(), "message store ready");

        Self {
            store: Arc::new(store),
            defaults: config.producer.send_options(),
        }
    }

    /// Producer defaults handed to every sender created through this factory.
    pub fn with_send_options(mut self, defaults: SendOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn create_connection(&self) -> Connection {
        let shared = Arc::new(ConnectionShared {
            id: Uuid::new_v4(),
            store: Arc::clone(&self.store),
            defaults: self.defaults,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        });
        info!(connection = %shared.id, "connection created");
        Connection { shared }
    }
}

#[derive(Debug)]
pub(crate) struct ConnectionShared {
    id: Uuid,
    pub(crate) store: Arc<MessageStore>,
    pub(crate) defaults: SendOptions,
    started: AtomicBool,
    closed: AtomicBool,
    sessions: Mutex<Vec<Weak<SessionInner>>>,
}

impl ConnectionShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn gate(&self) -> Gate {
        if self.is_closed() {
            Gate::Closed
        } else if self.started.load(Ordering::Acquire) {
            Gate::Open
        } else {
            Gate::Paused
        }
    }
}

/// Session factory with a delivery gate.
#[derive(Debug)]
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.shared.store
    }

    /// Starts (or resumes) delivery to this connection's receivers.
    pub fn start(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.shared.started.swap(true, Ordering::AcqRel) {
            info!(connection = %self.shared.id, "connection started");
            // receivers parked on a stopped connection wait on queue condvars
            self.shared.store.wake_all();
        }
        Ok(())
    }

    /// Pauses delivery. Blocked receives keep waiting; nothing is consumed.
    pub fn stop(&self) -> Result<()> {
        self.ensure_open()?;
        if self.shared.started.swap(false, Ordering::AcqRel) {
            info!(connection = %self.shared.id, "connection stopped");
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire) && !self.shared.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn create_session(&self, transacted: bool, ack_mode: AcknowledgeMode) -> Result<Session> {
        self.ensure_open()?;
        let session = Session::new(Arc::clone(&self.shared), transacted, ack_mode)?;
        let mut sessions = self.shared.sessions.lock();
        sessions.retain(|weak| weak.strong_count() > 0);
        sessions.push(session.downgrade());
        Ok(session)
    }

    /// Closes every session created from this connection, then the
    /// connection itself. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let sessions: Vec<Weak<SessionInner>> = std::mem::take(&mut *self.shared.sessions.lock());
        for inner in sessions.iter().filter_map(Weak::upgrade) {
            Session::from_inner(inner).close()?;
        }
        self.shared.store.wake_all();
        info!(connection = %self.shared.id, "connection closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(JmsError::closed("connection"));
        }
        Ok(())
    }
}
