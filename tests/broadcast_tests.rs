mod common;

use std::sync::Arc;
use std::time::Duration;

use common::setup_may_runtime;
use snooze::Broadcast;

#[test]
fn each_subscriber_sees_publish_order() {
    setup_may_runtime();
    let feed = Arc::new(Broadcast::new(32));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let subscription = feed.subscribe();
        handles.push(may::go!(move || {
            let mut seen = Vec::new();
            while let Some(value) = subscription.recv() {
                seen.push(value);
            }
            seen
        }));
    }

    // Let every consumer park on its queue before publishing.
    std::thread::sleep(Duration::from_millis(20));
    for i in 0..10 {
        assert_eq!(feed.send(i), 4);
    }
    drop(feed);

    for handle in handles {
        let seen = handle.join().unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn slow_subscriber_loses_only_its_own_values() {
    let feed = Broadcast::new(4);
    let slow = feed.subscribe_with_capacity(2);
    let fast = feed.subscribe();

    for i in 0..6 {
        feed.send(i);
    }

    // The slow queue kept only its first two values.
    assert_eq!(slow.recv(), Some(0));
    assert_eq!(slow.recv(), Some(1));
    assert_eq!(slow.try_recv(), None);
    assert_eq!(feed.dropped_count(), 4);

    for i in 0..6 {
        assert_eq!(fast.recv(), Some(i));
    }
}

#[test]
fn unsubscribe_then_publish_delivers_nothing_further() {
    let feed = Broadcast::new(8);
    let sub = feed.subscribe();
    feed.send("before");
    assert_eq!(sub.recv(), Some("before"));

    sub.unsubscribe();
    assert_eq!(feed.send("after"), 0);
    assert_eq!(feed.subscriber_count(), 0);
}

#[test]
fn recv_after_publisher_drop_drains_then_closes() {
    let feed = Broadcast::new(8);
    let sub = feed.subscribe();
    feed.send(1);
    feed.send(2);
    drop(feed);
    assert_eq!(sub.recv(), Some(1));
    assert_eq!(sub.recv(), Some(2));
    assert_eq!(sub.recv(), None);
    assert_eq!(sub.recv(), None);
}

#[test]
fn late_subscriber_misses_earlier_values() {
    let feed = Broadcast::new(8);
    feed.send(1);
    let sub = feed.subscribe();
    feed.send(2);
    assert_eq!(sub.recv(), Some(2));
    assert_eq!(sub.try_recv(), None);
}
