mod common;

use blipq::{AcknowledgeMode, ErrorKind, Message};
use common::{queue, started};

#[test]
fn recover_redelivers_and_acknowledge_consumes() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");
    store.enqueue_tail(&q, Message::text("one")).unwrap();
    store.enqueue_tail(&q, Message::text("two")).unwrap();

    let session = connection
        .create_session(false, AcknowledgeMode::Client)
        .unwrap();
    assert!(!session.is_transacted());
    let receiver = session.create_receiver(Some(&q), None).unwrap();

    let first = receiver.receive_no_wait().unwrap().unwrap();
    assert_eq!(first.text_body(), Some("one"));
    assert_eq!(session.pending(), (0, 1));

    session.recover().unwrap();
    let again = receiver.receive_no_wait().unwrap().unwrap();
    assert_eq!(again.text_body(), Some("one"));
    assert!(again.is_redelivered());

    let second = receiver.receive_no_wait().unwrap().unwrap();
    assert_eq!(second.text_body(), Some("two"));
    session.acknowledge().unwrap();
    assert_eq!(session.pending(), (0, 0));

    session.recover().unwrap();
    assert!(receiver.receive_no_wait().unwrap().is_none());
    assert_eq!(store.depth(&q), Some(0));
}

#[test]
fn acknowledge_mode_rules() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");

    let auto = connection
        .create_session(false, AcknowledgeMode::Auto)
        .unwrap();
    assert_eq!(auto.acknowledge().unwrap_err().kind(), ErrorKind::IllegalState);
    auto.recover().unwrap();

    let dups = connection
        .create_session(false, AcknowledgeMode::DupsOk)
        .unwrap();
    store.enqueue_tail(&q, Message::text("x")).unwrap();
    let receiver = dups.create_receiver(Some(&q), None).unwrap();
    assert!(receiver.receive_no_wait().unwrap().is_some());
    assert_eq!(dups.pending(), (0, 0));

    let tx = connection
        .create_session(true, AcknowledgeMode::Client)
        .unwrap();
    assert_eq!(tx.acknowledge_mode(), AcknowledgeMode::Transacted);
    assert_eq!(tx.recover().unwrap_err().kind(), ErrorKind::IllegalState);

    assert_eq!(
        connection
            .create_session(false, AcknowledgeMode::Transacted)
            .unwrap_err()
            .kind(),
        ErrorKind::IllegalState
    );
}
