//! Sender module for blipq
//! Exposes the QueueSender handle for putting messages on a queue.
#[allow(clippy::module_inception)]
pub mod sender;

pub use sender::QueueSender;
