//! blipq receiver module.
//!
//! Provides the `QueueReceiver` handle bound to one queue and an optional
//! message selector.

#[allow(clippy::module_inception)]
pub mod receiver;

pub use receiver::QueueReceiver;
