mod common;

use std::time::Duration;

use blipq::{ErrorKind, Message};
use common::{queue, started, transacted};

const WAIT: Duration = Duration::from_millis(500);

#[test]
fn rollback_redelivers_to_same_queue() {
    let (_store, connection) = started(&["Q"]);
    let q = queue("Q");

    let producer = transacted(&connection);
    producer.send(Some(&q), Message::text("hello")).unwrap();
    producer.commit().unwrap();

    let consumer = transacted(&connection);
    let receiver = consumer.create_receiver(Some(&q), None).unwrap();

    let first = receiver.receive(WAIT).unwrap().expect("first delivery");
    assert_eq!(first.text_body(), Some("hello"));
    assert!(!first.is_redelivered());
    assert_eq!(first.delivery_count(), 0);

    consumer.rollback().unwrap();

    let again = receiver.receive(WAIT).unwrap().expect("redelivery");
    assert_eq!(again.text_body(), Some("hello"));
    assert!(again.is_redelivered());
    assert_eq!(again.message_id(), first.message_id());
    assert_eq!(again.delivery_count(), 1);

    consumer.commit().unwrap();
    assert!(receiver.receive_no_wait().unwrap().is_none());
}

#[test]
fn fresh_messages_are_never_marked_redelivered() {
    let (_store, connection) = started(&["Q"]);
    let q = queue("Q");
    let session = transacted(&connection);
    for i in 0..5 {
        session.send(Some(&q), Message::text(format!("m{i}"))).unwrap();
    }
    session.commit().unwrap();

    let receiver = session.create_receiver(Some(&q), None).unwrap();
    for _ in 0..5 {
        let m = receiver.receive(WAIT).unwrap().unwrap();
        assert!(!m.is_redelivered());
    }
    session.commit().unwrap();
}

#[test]
fn sends_are_invisible_until_commit_then_in_order() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");

    let producer = transacted(&connection);
    let sender = producer.create_sender(Some(&q)).unwrap();
    for text in ["one", "two", "three"] {
        sender.send(Message::text(text)).unwrap();
    }
    assert_eq!(producer.pending(), (3, 0));

    let observer = common::auto(&connection);
    let receiver = observer.create_receiver(Some(&q), None).unwrap();
    assert!(receiver.receive_no_wait().unwrap().is_none());
    assert_eq!(store.depth(&q), Some(0));

    producer.commit().unwrap();

    let got: Vec<String> = (0..3)
        .map(|_| receiver.receive(WAIT).unwrap().unwrap())
        .map(|m| m.text_body().unwrap().to_string())
        .collect();
    assert_eq!(got, vec!["one", "two", "three"]);
}

#[test]
fn rollback_discards_buffered_sends() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");
    let session = transacted(&connection);
    session.send(Some(&q), Message::text("never")).unwrap();
    session.rollback().unwrap();
    session.commit().unwrap();
    assert_eq!(store.depth(&q), Some(0));
}

#[test]
fn redelivered_messages_keep_send_order() {
    let (_store, connection) = started(&["Q"]);
    let q = queue("Q");
    let producer = transacted(&connection);
    for text in ["a", "b", "c"] {
        producer.send(Some(&q), Message::text(text)).unwrap();
    }
    producer.commit().unwrap();

    let first = transacted(&connection);
    let second = transacted(&connection);
    let r1 = first.create_receiver(Some(&q), None).unwrap();
    let r2 = second.create_receiver(Some(&q), None).unwrap();
    assert_eq!(r1.receive(WAIT).unwrap().unwrap().text_body(), Some("a"));
    assert_eq!(r2.receive(WAIT).unwrap().unwrap().text_body(), Some("b"));

    // returned in the opposite order to how they were sent
    second.rollback().unwrap();
    first.rollback().unwrap();

    let order: Vec<(String, bool)> = (0..3)
        .map(|_| r1.receive(WAIT).unwrap().unwrap())
        .map(|m| (m.text_body().unwrap().to_string(), m.is_redelivered()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), true),
            ("b".to_string(), true),
            ("c".to_string(), false)
        ]
    );
}

#[test]
fn commit_against_removed_queue_rolls_back() {
    let (store, connection) = started(&["A", "gone"]);
    let a = queue("A");
    let gone = queue("gone");
    store.enqueue_tail(&a, Message::text("original")).unwrap();

    let session = transacted(&connection);
    let receiver = session.create_receiver(Some(&a), None).unwrap();
    assert!(receiver.receive(WAIT).unwrap().is_some());
    session.send(Some(&a), Message::text("new")).unwrap();
    session.send(Some(&gone), Message::text("lost")).unwrap();

    assert!(store.remove_queue(&gone));
    let err = session.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionRolledBack);
    assert_eq!(session.pending(), (0, 0));

    // only the returned delivery is visible, not the "new" send
    assert_eq!(store.depth(&a), Some(1));
    let back = receiver.receive(WAIT).unwrap().unwrap();
    assert_eq!(back.text_body(), Some("original"));
    assert!(back.is_redelivered());
}

#[test]
fn commit_on_non_transacted_session_is_illegal() {
    let (_store, connection) = started(&["Q"]);
    let session = common::auto(&connection);
    assert_eq!(session.commit().unwrap_err().kind(), ErrorKind::IllegalState);
    assert_eq!(session.rollback().unwrap_err().kind(), ErrorKind::IllegalState);
}

#[test]
fn rollback_requeues_in_send_order_even_when_delivered_out_of_order() {
    let (_store, connection) = started(&["Q"]);
    let q = queue("Q");
    let producer = transacted(&connection);
    producer
        .send(Some(&q), Message::text("A").with_property("tag", "a"))
        .unwrap();
    producer
        .send(Some(&q), Message::text("B").with_property("tag", "b"))
        .unwrap();
    producer.commit().unwrap();

    let consumer = transacted(&connection);
    let only_b = consumer.create_receiver(Some(&q), Some("tag = 'b'")).unwrap();
    let only_a = consumer.create_receiver(Some(&q), Some("tag = 'a'")).unwrap();
    assert_eq!(only_b.receive(WAIT).unwrap().unwrap().text_body(), Some("B"));
    assert_eq!(only_a.receive(WAIT).unwrap().unwrap().text_body(), Some("A"));
    consumer.rollback().unwrap();

    let all = consumer.create_receiver(Some(&q), None).unwrap();
    let order: Vec<String> = (0..2)
        .map(|_| all.receive(WAIT).unwrap().unwrap())
        .map(|m| m.text_body().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["A", "B"]);
    consumer.commit().unwrap();
}
