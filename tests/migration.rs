use log_event_store::*;
use pretty_assertions::assert_eq;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use test_log::test;

fn record(ts: Timestamp, message: &str) -> EventRecord {
    EventRecord::new(ts, LogLevel::Info, "com.example.Migration", message)
}

fn ids(container: &EventContainer) -> Vec<EventId> {
    container
        .unfiltered_snapshot()
        .iter()
        .map(|w| w.id())
        .collect()
}

/// Signals on the channel when a migration's final progress report arrives.
struct MigrationWatcher {
    tx: mpsc::Sender<usize>,
}

impl ContainerListener for MigrationWatcher {
    fn migration_progress(&self, done: usize, total: usize) {
        if done == total {
            let _ = self.tx.send(done);
        }
    }
}

fn watch(container: &EventContainer) -> mpsc::Receiver<usize> {
    let (tx, rx) = mpsc::channel();
    container.add_listener(Arc::new(MigrationWatcher { tx }));
    rx
}

fn wait_for_migration(rx: &mpsc::Receiver<usize>) -> usize {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("migration did not complete in time")
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn migration_to_linear_preserves_events() {
    let container = EventContainer::with_capacity(5);
    for i in 0..3u64 {
        container.add(record(i, &format!("m{i}")));
    }
    let rx = watch(&container);

    container.set_cyclic(false);
    wait_for_migration(&rx);

    assert!(!container.is_cyclic());
    assert_eq!(container.max_size(), None);
    assert_eq!(ids(&container), vec![1, 2, 3]);

    // Unbounded mode grows past the old capacity
    for i in 3..13u64 {
        container.add(record(i, &format!("m{i}")));
    }
    assert_eq!(container.len(), 13);
    assert!(!container.reached_capacity());
}

#[test]
fn migration_to_cyclic_keeps_newest() {
    let container = EventContainer::new(3, false, Arc::new(DefaultColorizer));
    for i in 0..5u64 {
        container.add(record(i, &format!("m{i}")));
    }
    assert_eq!(container.len(), 5);
    let rx = watch(&container);

    container.set_cyclic(true);
    wait_for_migration(&rx);

    assert!(container.is_cyclic());
    assert_eq!(container.max_size(), Some(3));
    assert!(container.reached_capacity());
    assert_eq!(ids(&container), vec![3, 4, 5]);
    assert_eq!(container.filtered_len(), 3);
}

#[test]
fn set_cyclic_is_a_noop_when_unchanged() {
    let container = EventContainer::with_capacity(5);
    container.add(record(0, "a"));
    let rx = watch(&container);

    container.set_cyclic(true);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(ids(&container), vec![1]);
}

#[test]
fn concurrent_adds_survive_mode_switch() {
    const EVENTS: u64 = 2000;

    let container = Arc::new(EventContainer::with_capacity(10_000));
    let rx = watch(&container);

    let producer = {
        let container = Arc::clone(&container);
        std::thread::spawn(move || {
            for i in 0..EVENTS {
                container.add(record(i, &format!("m{i}")));
                if i == EVENTS / 2 {
                    container.set_cyclic(false);
                }
            }
        })
    };
    producer.join().expect("producer panicked");
    wait_for_migration(&rx);

    // No event lost, none duplicated, arrival order intact
    assert_eq!(container.len(), EVENTS as usize);
    let got = ids(&container);
    let expected: Vec<EventId> = (1..=EVENTS).collect();
    assert_eq!(got, expected);
    assert_eq!(container.filtered_len(), EVENTS as usize);
}

#[test]
fn superseded_migration_leaves_consistent_state() {
    let container = EventContainer::with_capacity(4);
    for i in 0..6u64 {
        container.add(record(i, &format!("m{i}")));
    }

    // Flip twice quickly; the first migration may be superseded mid-flight
    container.set_cyclic(false);
    container.set_cyclic(true);

    wait_until(|| {
        container.is_cyclic() && container.len() <= 4 && container.filtered_len() == container.len()
    });

    let got = ids(&container);
    assert!(got.windows(2).all(|w| w[0] < w[1]), "ids out of order: {got:?}");
    assert_eq!(container.max_size(), Some(4));
}
