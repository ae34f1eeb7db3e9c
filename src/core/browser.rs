//! Read-only views over a queue.

use std::sync::Arc;
use std::vec;

use crate::core::error::Result;
use crate::core::message::Message;
use crate::core::queue::{MessageStore, Queue};
use crate::core::selector::Selector;
use crate::core::session::Session;

/// Looks at a queue's messages without consuming them.
#[derive(Debug, Clone)]
pub struct QueueBrowser {
    session: Session,
    queue: Queue,
    selector: Selector,
}

impl QueueBrowser {
    pub(crate) fn new(session: Session, queue: Queue, selector: Selector) -> Self {
        Self {
            session,
            queue,
            selector,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn message_selector(&self) -> Option<&str> {
        self.selector.source()
    }

    /// A fresh pass over the queue. Nothing is read until the first call to
    /// `next`, which snapshots every live matching message at once; each
    /// call to `enumeration` starts over.
    pub fn enumeration(&self) -> Result<Browse> {
        self.session.ensure_open()?;
        Ok(Browse {
            store: self.session.shared_store(),
            queue: self.queue.clone(),
            selector: self.selector.clone(),
            snapshot: None,
        })
    }
}

/// Lazy iterator returned by [`QueueBrowser::enumeration`].
#[derive(Debug)]
pub struct Browse {
    store: Arc<MessageStore>,
    queue: Queue,
    selector: Selector,
    snapshot: Option<vec::IntoIter<Message>>,
}

impl Iterator for Browse {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        if self.snapshot.is_none() {
            // a queue removed since the browser was created reads as empty
            let messages = self
                .store
                .peek_matching(&self.queue, &self.selector)
                .unwrap_or_default();
            self.snapshot = Some(messages.into_iter());
        }
        self.snapshot.as_mut().and_then(Iterator::next)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::connection::ConnectionFactory;
    use crate::core::message::Message;
    use crate::core::queue::MessageStore;
    use crate::core::session::AcknowledgeMode;
    use std::sync::Arc;

    #[test]
    fn snapshot_is_taken_on_first_pull() {
        let store = Arc::new(MessageStore::new());
        let queue = store.declare_queue("q");
        let connection = ConnectionFactory::new(Arc::clone(&store)).create_connection();
        let session = connection
            .create_session(false, AcknowledgeMode::Auto)
            .unwrap();
        let browser = session.create_browser(Some(&queue), None).unwrap();

        let mut pass = browser.enumeration().unwrap();
        session.send(Some(&queue), Message::text("late")).unwrap();
        assert_eq!(pass.next().unwrap().text_body(), Some("late"));
        assert!(pass.next().is_none());

        session.send(Some(&queue), Message::text("later")).unwrap();
        assert_eq!(browser.enumeration().unwrap().count(), 2);
        assert_eq!(store.depth(&queue), Some(2));
    }
}
