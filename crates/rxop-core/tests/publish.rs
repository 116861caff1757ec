// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use rxop_channel::VecDequeQueueFactory;
use rxop_core::PublishOperator;
use rxop_testing::{ManualSource, RecordingSink};

/// Upstream emits `1..=5` with prefetch 4. Both subscribers request 5 up front. Expect each to
/// see `[1,2,3,4,5]` then `on_complete`; upstream sees an initial request of 4, then a refill of
/// `limit = 4 - 1 = 3` once three items have been broadcast.
#[test]
fn two_subscribers_equal_pace_see_the_same_sequence() {
    let upstream = ManualSource::<i32>::new();
    let publish = PublishOperator::new(upstream.clone(), 4, Arc::new(VecDequeQueueFactory));

    let sink_a = RecordingSink::<i32>::new();
    let sink_b = RecordingSink::<i32>::new();
    publish.subscribe(sink_a.clone());
    publish.subscribe(sink_b.clone());
    sink_a.request(5);
    sink_b.request(5);

    assert_eq!(upstream.requested_total(), 4);

    for item in 1..=5 {
        upstream.emit(item);
    }
    upstream.complete();

    assert_eq!(sink_a.items(), vec![1, 2, 3, 4, 5]);
    assert_eq!(sink_b.items(), vec![1, 2, 3, 4, 5]);
    assert!(sink_a.is_terminated());
    assert!(sink_b.is_terminated());
    assert_eq!(upstream.requested_total(), 4 + 3);
}

/// Sub A requests unbounded; Sub B requests 2 then stalls. Upstream emits `1..=10` with prefetch
/// 4. Both should see exactly `[1,2]`; neither sees `3` while B is still attached (the throttle
/// is to the slowest subscriber); once B cancels, A drains the rest.
#[test]
fn slow_subscriber_throttles_the_fast_one_until_it_cancels() {
    let upstream = ManualSource::<i32>::new();
    let publish = PublishOperator::new(upstream.clone(), 4, Arc::new(VecDequeQueueFactory));

    let sink_a = RecordingSink::<i32>::new();
    let sink_b = RecordingSink::<i32>::new();
    publish.subscribe(sink_a.clone());
    publish.subscribe(sink_b.clone());
    sink_a.request(i64::MAX);
    sink_b.request(2);

    // 1 and 2 clear the joint throttle; 3 lands in the queue but stalls (B is out of demand).
    upstream.emit(1);
    upstream.emit(2);
    upstream.emit(3);

    assert_eq!(sink_a.items(), vec![1, 2]);
    assert_eq!(sink_b.items(), vec![1, 2]);
    assert!(!sink_a.is_terminated());

    // Cancelling B unblocks the drain: A alone now sets the pace, starting with the queued 3.
    sink_b.cancel();

    for item in 4..=10 {
        upstream.emit(item);
    }
    upstream.complete();

    assert_eq!(sink_a.items(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert!(sink_a.is_terminated());
}

/// Upstream completes before a late subscriber joins. The late joiner gets `on_subscribe` then
/// an immediate terminal signal, with no `on_next`.
#[test]
fn late_joiner_after_terminal_gets_only_the_terminal_signal() {
    let upstream = ManualSource::<i32>::new();
    let publish = PublishOperator::new(upstream.clone(), 4, Arc::new(VecDequeQueueFactory));

    let sink_a = RecordingSink::<i32>::new();
    publish.subscribe(sink_a.clone());
    sink_a.request(i64::MAX);

    upstream.emit(1);
    upstream.complete();
    assert!(sink_a.is_terminated());

    let late = RecordingSink::<i32>::new();
    publish.subscribe(late.clone());

    assert!(late.items().is_empty());
    assert!(late.is_terminated());
    assert!(late.subscription().is_some());
}
