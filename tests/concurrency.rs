mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blipq::{Message, PropertyValue};
use common::{auto, queue, started, transacted};

const PER_QUEUE: i64 = 50;

fn seq_of(message: &Message) -> i64 {
    match message.property("seq") {
        Some(PropertyValue::Long(n)) => *n,
        other => panic!("missing seq property: {other:?}"),
    }
}

fn seqs(messages: impl Iterator<Item = Message>) -> Vec<i64> {
    messages.map(|m| seq_of(&m)).collect()
}

#[test]
fn multi_queue_commit_is_all_or_nothing_for_observers() {
    let (_store, connection) = started(&["A", "B"]);
    let (a, b) = (queue("A"), queue("B"));
    let expected: Vec<i64> = (0..PER_QUEUE).collect();

    let observer = {
        let session = auto(&connection);
        let (a, b) = (a.clone(), b.clone());
        let expected = expected.clone();
        thread::spawn(move || {
            let browse_a = session.create_browser(Some(&a), None).unwrap();
            let browse_b = session.create_browser(Some(&b), None).unwrap();
            let deadline = Instant::now() + Duration::from_secs(10);

            // Before commit A is empty; after it A holds the whole unit.
            loop {
                let seen = seqs(browse_a.enumeration().unwrap());
                if seen.is_empty() {
                    assert!(Instant::now() < deadline, "commit never became visible");
                    thread::yield_now();
                    continue;
                }
                assert_eq!(seen, expected);
                break;
            }

            // A and B were written under one set of locks.
            assert_eq!(seqs(browse_b.enumeration().unwrap()), expected);

            let receiver = session.create_receiver(Some(&a), None).unwrap();
            let received: Vec<i64> = (0..PER_QUEUE)
                .map(|_| seq_of(&receiver.receive(Duration::from_secs(1)).unwrap().unwrap()))
                .collect();
            assert_eq!(received, expected);
        })
    };

    let producer = transacted(&connection);
    for n in 0..PER_QUEUE {
        producer
            .send(Some(&a), Message::text("a").with_property("seq", n))
            .unwrap();
        producer
            .send(Some(&b), Message::text("b").with_property("seq", n))
            .unwrap();
        if n % 10 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    producer.commit().unwrap();

    observer.join().unwrap();
}

#[test]
fn browsing_while_draining_never_repeats_a_message() {
    let (store, connection) = started(&["Q"]);
    let q = queue("Q");
    for n in 0..2_000i64 {
        store
            .enqueue_tail(&q, Message::text("m").with_property("seq", n))
            .unwrap();
    }

    let drained = Arc::new(AtomicBool::new(false));
    let drainer = {
        let session = auto(&connection);
        let q = q.clone();
        let drained = Arc::clone(&drained);
        thread::spawn(move || {
            let receiver = session.create_receiver(Some(&q), None).unwrap();
            let mut count = 0;
            while receiver.receive_no_wait().unwrap().is_some() {
                count += 1;
            }
            drained.store(true, Ordering::Release);
            count
        })
    };

    let session = auto(&connection);
    let browser = session.create_browser(Some(&q), None).unwrap();
    let mut passes = 0;
    loop {
        let finished = drained.load(Ordering::Acquire);
        let pass = seqs(browser.enumeration().unwrap());
        let unique: HashSet<i64> = pass.iter().copied().collect();
        assert_eq!(unique.len(), pass.len(), "duplicate within one pass");
        assert!(pass.windows(2).all(|w| w[0] < w[1]), "pass out of order");
        passes += 1;
        if finished {
            assert!(pass.is_empty());
            break;
        }
    }

    assert_eq!(drainer.join().unwrap(), 2_000);
    assert!(passes >= 1);
}
