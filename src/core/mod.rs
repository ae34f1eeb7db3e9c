pub mod browser;
pub mod connection;
pub mod delivery_mode;
pub mod error;
pub mod message;
pub mod queue;
pub mod receiver;
pub mod selector;
pub mod sender;
pub mod session;
