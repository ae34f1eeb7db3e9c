//! blipq – an in-process, transactional point-to-point message queue engine.
//!
//! This crate exports
//!  * `core`    – messages, queues, sessions, selectors and the handles built on them
//!  * `config`  – TOML-driven configuration with environment overrides
//!  * `logging` – `tracing` subscriber setup
//!
//! Applications create a [`ConnectionFactory`] over a [`MessageStore`], open
//! a [`Connection`], and do their sending and receiving through
//! [`Session`]s. A transacted session publishes its sends and settles its
//! receives on commit; rollback puts received messages back at the head of
//! their queue, marked redelivered.

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use config::{load_config, Config, ConfigError};
pub use crate::core::browser::{Browse, QueueBrowser};
pub use crate::core::connection::{Connection, ConnectionFactory};
pub use crate::core::delivery_mode::DeliveryMode;
pub use crate::core::error::{ErrorKind, JmsError, Result};
pub use crate::core::message::{Message, MessageBody, PropertyValue, SendOptions};
pub use crate::core::queue::{DeadLetterPolicy, MessageStore, Queue};
pub use crate::core::receiver::QueueReceiver;
pub use crate::core::selector::{PropertySource, Selector};
pub use crate::core::sender::QueueSender;
pub use crate::core::session::{AcknowledgeMode, Session};
