//! Queue storage.
//!
//! Every queue is an independently ordered container guarded by its own
//! lock, registered by name in the [`MessageStore`]. Ordering rules:
//! - messages are taken highest priority first, earliest position first
//!   among equal priority;
//! - plain enqueues append at the tail;
//! - messages returned by rollback/recover are inserted into a redelivered
//!   prefix at the head, ordered by their original send sequence.

pub mod state;
pub mod store;

pub use store::{DeadLetterPolicy, MessageStore};

use std::fmt;

/// Name of a point-to-point destination.
///
/// A `Queue` is only a handle; whether it refers to a known queue is decided
/// by the store at the time of use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Queue(String);

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Queue {
    fn from(s: &str) -> Self {
        Queue(s.to_owned())
    }
}

impl From<String> for Queue {
    fn from(s: String) -> Self {
        Queue(s)
    }
}

impl AsRef<str> for Queue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
