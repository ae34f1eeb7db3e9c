use blipq::{AcknowledgeMode, Connection, ConnectionFactory, Message, MessageStore, Queue};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;

const BATCH: usize = 1_000;

fn connection() -> (Connection, Queue) {
    let store = Arc::new(MessageStore::new());
    let queue = store.declare_queue("bench");
    let connection = ConnectionFactory::new(store).create_connection();
    connection.start().expect("start connection");
    (connection, queue)
}

fn bench_auto_send_receive(c: &mut Criterion) {
    let (connection, queue) = connection();
    let session = connection
        .create_session(false, AcknowledgeMode::Auto)
        .expect("session");
    let receiver = session.create_receiver(Some(&queue), None).expect("receiver");

    let mut group = c.benchmark_group("auto_ack");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function("send_then_receive", |b| {
        b.iter(|| {
            for i in 0..BATCH {
                session
                    .send(Some(&queue), Message::text(format!("msg-{i}")))
                    .expect("send");
            }
            for _ in 0..BATCH {
                receiver.receive_no_wait().expect("receive").expect("message");
            }
        })
    });
    group.finish();
}

fn bench_transacted_commit(c: &mut Criterion) {
    let (connection, queue) = connection();
    let session = connection
        .create_session(true, AcknowledgeMode::Transacted)
        .expect("session");
    let receiver = session.create_receiver(Some(&queue), None).expect("receiver");

    let mut group = c.benchmark_group("transacted");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function("commit_batch", |b| {
        b.iter(|| {
            for i in 0..BATCH {
                session
                    .send(Some(&queue), Message::text(format!("msg-{i}")))
                    .expect("send");
            }
            session.commit().expect("commit sends");
            for _ in 0..BATCH {
                receiver.receive_no_wait().expect("receive").expect("message");
            }
            session.commit().expect("commit receives");
        })
    });
    group.bench_function("rollback_redeliver", |b| {
        b.iter_batched(
            || {
                for i in 0..BATCH {
                    session
                        .send(Some(&queue), Message::text(format!("msg-{i}")))
                        .expect("send");
                }
                session.commit().expect("commit sends");
            },
            |_| {
                for _ in 0..BATCH {
                    receiver.receive_no_wait().expect("receive").expect("message");
                }
                session.rollback().expect("rollback");
                for _ in 0..BATCH {
                    receiver.receive_no_wait().expect("receive").expect("message");
                }
                session.commit().expect("commit receives");
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

fn bench_selector_scan(c: &mut Criterion) {
    let (connection, queue) = connection();
    let session = connection
        .create_session(false, AcknowledgeMode::Auto)
        .expect("session");
    for i in 0..BATCH {
        session
            .send(
                Some(&queue),
                Message::text("filler").with_property("kind", "noise").with_property("n", i as i64),
            )
            .expect("send");
    }
    let receiver = session
        .create_receiver(Some(&queue), Some("kind = 'signal' AND n > 10"))
        .expect("receiver");

    c.bench_function("selector_scan_1k", |b| {
        b.iter(|| {
            session
                .send(
                    Some(&queue),
                    Message::text("hit").with_property("kind", "signal").with_property("n", 42),
                )
                .expect("send");
            receiver.receive_no_wait().expect("receive").expect("message");
        })
    });
}

criterion_group!(
    benches,
    bench_auto_send_receive,
    bench_transacted_commit,
    bench_selector_scan
);
criterion_main!(benches);
