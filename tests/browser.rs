mod common;

use std::time::Duration;

use blipq::Message;
use common::{auto, queue, started, transacted};

#[test]
fn browsing_never_consumes() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");
    let session = auto(&connection);
    for (i, color) in ["red", "blue", "red"].into_iter().enumerate() {
        session
            .send(
                Some(&q),
                Message::text(format!("m{i}")).with_property("color", color),
            )
            .unwrap();
    }

    let all = session.create_browser(Some(&q), None).unwrap();
    let texts: Vec<String> = all
        .enumeration()
        .unwrap()
        .map(|m| m.text_body().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["m0", "m1", "m2"]);

    let reds = session.create_browser(Some(&q), Some("color = 'red'")).unwrap();
    assert_eq!(reds.enumeration().unwrap().count(), 2);
    assert_eq!(reds.message_selector(), Some("color = 'red'"));

    // restartable, and nothing was marked
    for m in all.enumeration().unwrap() {
        assert!(!m.is_redelivered());
    }
    assert_eq!(store.depth(&q), Some(3));

    let receiver = session.create_receiver(Some(&q), None).unwrap();
    for expected in ["m0", "m1", "m2"] {
        let m = receiver.receive(Duration::from_millis(200)).unwrap().unwrap();
        assert_eq!(m.text_body(), Some(expected));
        assert!(!m.is_redelivered());
    }
}

#[test]
fn browser_does_not_see_uncommitted_or_in_flight_messages() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");
    store.enqueue_tail(&q, Message::text("taken")).unwrap();
    store.enqueue_tail(&q, Message::text("left")).unwrap();

    let session = transacted(&connection);
    let receiver = session.create_receiver(Some(&q), None).unwrap();
    assert!(receiver.receive_no_wait().unwrap().is_some());
    session.send(Some(&q), Message::text("pending")).unwrap();

    let observer = auto(&connection);
    let browser = observer.create_browser(Some(&q), None).unwrap();
    let seen: Vec<String> = browser
        .enumeration()
        .unwrap()
        .map(|m| m.text_body().unwrap().to_string())
        .collect();
    assert_eq!(seen, vec!["left"]);

    session.rollback().unwrap();
    assert_eq!(browser.enumeration().unwrap().count(), 2);
}
