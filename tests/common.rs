#![allow(dead_code)]

use std::sync::{Arc, Once};

use blipq::{AcknowledgeMode, Connection, ConnectionFactory, MessageStore, Queue, Session};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        blipq::logging::init_logging();
    });
}

/// A store with `queues` declared and a started connection over it.
pub fn started(queues: &[&str]) -> (Arc<MessageStore>, Connection) {
    init_logging();
    let store = Arc::new(MessageStore::new());
    for name in queues {
        store.declare_queue(name);
    }
    let connection = ConnectionFactory::new(Arc::clone(&store)).create_connection();
    connection.start().expect("start connection");
    (store, connection)
}

pub fn transacted(connection: &Connection) -> Session {
    connection
        .create_session(true, AcknowledgeMode::Transacted)
        .expect("transacted session")
}

pub fn auto(connection: &Connection) -> Session {
    connection
        .create_session(false, AcknowledgeMode::Auto)
        .expect("auto session")
}

pub fn queue(name: &str) -> Queue {
    Queue::new(name)
}
