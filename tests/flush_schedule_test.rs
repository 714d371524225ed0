mod common;

use common::{ScriptedTransport, Step, click, client_with, count_of, label, settings};
use pixel_relay::buffer::{BatchTrigger, EventQueue};
use pixel_relay::domain::EventType;
use pixel_relay::scheduler::{Batcher, FlushOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test(start_paused = true)]
async fn failed_batch_is_retried_on_the_next_tick_only() {
    let transport = Arc::new(ScriptedTransport::with_script(&[Step::Fail]));
    let client = client_with(settings(Duration::from_secs(5), HOUR), Arc::clone(&transport));
    client.start().unwrap();

    client.track_click("first", "a", "First");
    sleep(Duration::from_millis(5_100)).await;

    assert_eq!(transport.attempts(), 1);
    assert!(transport.delivered().is_empty());
    let queued: Vec<String> = client.queue().snapshot().iter().map(label).collect();
    assert_eq!(queued, ["first"]);

    // No immediate retry between ticks.
    sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.attempts(), 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(transport.delivered().len(), 1);
    assert_eq!(label(&transport.delivered()[0][0]), "first");
    assert!(client.queue().is_empty());

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn retried_batch_stays_ahead_of_events_recorded_during_the_failure() {
    let transport = Arc::new(ScriptedTransport::with_script(&[Step::Fail]));
    let queue = EventQueue::new();
    let batcher = Batcher::new(queue.clone(), transport.clone());

    queue.enqueue(click("a"));
    queue.enqueue(click("b"));
    let outcome = batcher.flush(BatchTrigger::Scheduled).await;
    assert!(matches!(outcome, FlushOutcome::Requeued { events: 2, .. }));

    queue.enqueue(click("c"));
    let outcome = batcher.flush(BatchTrigger::Scheduled).await;
    assert!(matches!(outcome, FlushOutcome::Delivered { events: 3, .. }));

    let delivered: Vec<String> = transport.delivered_events().iter().map(label).collect();
    assert_eq!(delivered, ["a", "b", "c"]);

    let stats = batcher.stats();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn empty_queue_flush_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    let batcher = Batcher::new(EventQueue::new(), transport.clone());

    assert_eq!(batcher.flush(BatchTrigger::Manual).await, FlushOutcome::Empty);
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_flush_is_skipped_while_one_is_in_flight() {
    let transport = Arc::new(ScriptedTransport::new().with_delay(Duration::from_secs(2)));
    let queue = EventQueue::new();
    let batcher = Arc::new(Batcher::new(queue.clone(), transport.clone()));

    queue.enqueue(click("slow"));
    let first = tokio::spawn({
        let batcher = Arc::clone(&batcher);
        async move { batcher.flush(BatchTrigger::Scheduled).await }
    });
    tokio::task::yield_now().await;

    queue.enqueue(click("waiting"));
    assert_eq!(batcher.flush(BatchTrigger::Heartbeat).await, FlushOutcome::Skipped);
    assert_eq!(queue.len(), 1);

    assert!(matches!(first.await.unwrap(), FlushOutcome::Delivered { events: 1, .. }));
    assert!(matches!(
        batcher.flush(BatchTrigger::Scheduled).await,
        FlushOutcome::Delivered { events: 1, .. }
    ));

    let delivered: Vec<String> = transport.delivered_events().iter().map(label).collect();
    assert_eq!(delivered, ["slow", "waiting"]);
}

async fn heartbeats_after(batch_interval: Duration, run_for: Duration) -> usize {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(
        settings(batch_interval, Duration::from_secs(30)),
        Arc::clone(&transport),
    );
    client.start().unwrap();

    sleep(run_for).await;
    client.stop().await;

    let mut events = transport.delivered_events();
    events.extend(client.queue().snapshot());
    count_of(&events, &EventType::Heartbeat)
}

#[tokio::test(start_paused = true)]
async fn heartbeat_cadence_ignores_batch_interval() {
    let run_for = Duration::from_secs(95);
    for batch_interval in [Duration::from_secs(1), Duration::from_secs(7), Duration::from_secs(60)] {
        let heartbeats = heartbeats_after(batch_interval, run_for).await;
        assert_eq!(heartbeats, 3, "batch interval {batch_interval:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn heartbeat_triggers_a_flush_between_ticks() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(
        settings(HOUR, Duration::from_secs(30)),
        Arc::clone(&transport),
    );
    client.start().unwrap();

    client.track_click("pending", "a", "Pending");
    sleep(Duration::from_millis(30_100)).await;

    let delivered = transport.delivered_events();
    assert_eq!(delivered.len(), 2);
    assert_eq!(label(&delivered[0]), "pending");
    assert_eq!(delivered[1].event_type(), &EventType::Heartbeat);
    assert_eq!(delivered[1].data()["active_time"], 30);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_client_sends_nothing_further() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(settings(Duration::from_secs(5), HOUR), Arc::clone(&transport));
    client.start().unwrap();
    client.stop().await;

    client.track_click("late", "a", "Late");
    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 0);
}
