mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{retry, FailingListener, FlakyStore, RecordingListener, StalledStore};
use outage_router::prelude::*;
use outage_router::telemetry::{Outcome, RetryEvent, TimingRecord};

fn stack(
    config: &RetryConfig,
    listeners: ListenerRegistry,
    store: Arc<dyn OutageStore>,
    sink: MemorySink,
) -> OutageEventConsumer {
    let registry = DecoratorFactory::new(config)
        .expect("valid retry config")
        .with_sink(sink)
        .build_registry(Collaborators::new(listeners, store))
        .expect("registry builds");
    OutageEventConsumer::new(Arc::new(registry))
}

#[tokio::test]
async fn scada_event_is_processed_and_saved_once() {
    let store = InMemoryStore::new();
    let listener = RecordingListener::named("audit");
    let listeners = ListenerRegistry::builder().listener(listener.clone()).build();
    let consumer = stack(&retry(3, true), listeners, Arc::new(store.clone()), MemorySink::new());

    let event = OutageEvent::new("42", SourceSystem::Scada, Utc::now())
        .with_severity(5)
        .with_critical(false);
    consumer.consume(event).await;

    let saved = store.events();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].event_id(), "42");
    assert_eq!(saved[0].priority(), Some(50));
    assert_eq!(saved[0].description(), Some("SCADA outage alarm"));
    assert_eq!(listener.seen(), vec!["42"]);
    assert_eq!(consumer.stats().processed(), 1);
}

#[tokio::test]
async fn retry_disabled_means_single_attempt() {
    let store = FlakyStore::new(usize::MAX);
    let consumer = stack(
        &retry(5, false),
        ListenerRegistry::empty(),
        Arc::new(store.clone()),
        MemorySink::new(),
    );

    let err = consumer
        .try_consume(OutageEvent::new("7", SourceSystem::Ems, Utc::now()))
        .await
        .unwrap_err();

    assert_eq!(store.attempts(), 1);
    assert_eq!(err.kind(), ErrorKind::Telemetry);
    assert_eq!(err.wrapped().map(OutageError::kind), Some(ErrorKind::Processing));
    assert_eq!(err.root_cause().stage(), Some(Stage::Persist));
}

#[tokio::test]
async fn transient_store_failure_recovers_and_redelivers_to_listeners() {
    let store = FlakyStore::new(2);
    let listener = RecordingListener::named("audit");
    let listeners = ListenerRegistry::builder().listener(listener.clone()).build();
    let consumer = stack(&retry(3, true), listeners, Arc::new(store.clone()), MemorySink::new());

    consumer
        .try_consume(OutageEvent::new("11", SourceSystem::Dms, Utc::now()).with_severity(3))
        .await
        .unwrap();

    assert_eq!(store.attempts(), 3);
    assert_eq!(store.saved.len(), 1, "saved exactly once");
    // Notification precedes persistence, so each retried attempt notifies again.
    assert_eq!(listener.seen(), vec!["11", "11", "11"]);
}

#[tokio::test]
async fn listener_failure_aborts_fan_out_through_the_full_stack() {
    let store = InMemoryStore::new();
    let before = RecordingListener::named("before");
    let after = RecordingListener::named("after");
    let listeners = ListenerRegistry::builder()
        .listener(before.clone())
        .listener(FailingListener)
        .listener(after.clone())
        .build();
    let consumer = stack(&retry(2, true), listeners, Arc::new(store.clone()), MemorySink::new());

    let err = consumer
        .try_consume(OutageEvent::new("99", SourceSystem::Scada, Utc::now()))
        .await
        .unwrap_err();

    assert_eq!(before.seen().len(), 2, "called once per attempt");
    assert!(after.seen().is_empty(), "listener after the failure is never called");
    assert!(store.is_empty(), "persist never reached");

    assert_eq!(err.event_id(), Some("99"));
    assert_eq!(err.wrapped().map(OutageError::kind), Some(ErrorKind::MaxRetriesExceeded));
    match err.root_cause() {
        OutageError::Publish { listener, .. } => assert_eq!(listener, "pager"),
        other => panic!("expected publish failure, got {other:?}"),
    }
    assert_eq!(consumer.stats().failed(), 1);
}

#[tokio::test]
async fn one_timing_record_spans_all_retry_attempts() {
    let sink = MemorySink::new();
    let store = FlakyStore::new(usize::MAX);
    let consumer = stack(&retry(3, true), ListenerRegistry::empty(), Arc::new(store), sink.clone());

    let _ = consumer.try_consume(OutageEvent::new("5", SourceSystem::Scada, Utc::now())).await;

    let events = sink.events();
    let timings: Vec<&TimingRecord> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Timing(record) => Some(record),
            _ => None,
        })
        .collect();
    assert_eq!(timings.len(), 1);
    assert_eq!(timings[0].handler, "ScadaHandler");
    assert_eq!(timings[0].event_id, "5");

    let retries: Vec<&RetryEvent> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Retry(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        retries,
        vec![
            &RetryEvent::Attempt { event_id: "5".into(), attempt: 2 },
            &RetryEvent::Attempt { event_id: "5".into(), attempt: 3 },
            &RetryEvent::Exhausted { event_id: "5".into(), attempts: 3 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_event_still_leaves_a_failure_timing_record() {
    let sink = MemorySink::new();
    let consumer =
        stack(&retry(3, true), ListenerRegistry::empty(), Arc::new(StalledStore), sink.clone())
            .with_timeout(std::time::Duration::from_millis(200));

    let err = consumer
        .try_consume(OutageEvent::new("slow-1", SourceSystem::Scada, Utc::now()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(consumer.stats().failed(), 1);
    match sink.events().as_slice() {
        [PipelineEvent::Timing(record)] => {
            assert_eq!(record.event_id, "slow-1");
            assert_eq!(record.handler, "ScadaHandler");
            assert_eq!(record.outcome, Outcome::Failure);
        }
        other => panic!("expected a single timing record, got {other:?}"),
    }
}

#[tokio::test]
async fn ems_escalation_and_priority_cap() {
    let store = InMemoryStore::new();
    let consumer =
        stack(&retry(1, true), ListenerRegistry::empty(), Arc::new(store.clone()), MemorySink::new());

    consumer.consume(OutageEvent::new("e1", SourceSystem::Ems, Utc::now()).with_severity(14)).await;

    let saved = store.events();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].severity(), MAX_SEVERITY);
    assert!(saved[0].is_critical(), "high severity escalates to critical");
    assert_eq!(saved[0].priority(), Some(MAX_PRIORITY));
}

#[tokio::test]
async fn dms_future_event_is_rejected_before_any_side_effect() {
    let store = InMemoryStore::new();
    let listener = RecordingListener::named("audit");
    let listeners = ListenerRegistry::builder().listener(listener.clone()).build();
    let consumer = stack(&retry(2, true), listeners, Arc::new(store.clone()), MemorySink::new());

    let future = Utc::now() + ChronoDuration::hours(1);
    let err = consumer
        .try_consume(OutageEvent::new("d1", SourceSystem::Dms, future))
        .await
        .unwrap_err();

    assert_eq!(err.root_cause().stage(), Some(Stage::Validate));
    assert!(store.is_empty());
    assert!(listener.seen().is_empty());
}

#[tokio::test]
async fn wire_payload_flows_through_the_pipeline() {
    let store = InMemoryStore::new();
    let consumer =
        stack(&retry(3, true), ListenerRegistry::empty(), Arc::new(store.clone()), MemorySink::new());

    let payload = r#"{
        "eventId": "w-1",
        "eventDescription": "  Feeder 12 tripped  ",
        "sourceSystem": "scada",
        "eventTime": "2025-10-06 14:38:00",
        "stormLevel": 7,
        "critical": true
    }"#;
    let event: OutageEvent = serde_json::from_str(payload).unwrap();
    consumer.consume(event).await;

    let saved = store.events();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].description(), Some("Feeder 12 tripped"));
    assert_eq!(saved[0].event_time(), Utc.with_ymd_and_hms(2025, 10, 6, 14, 38, 0).unwrap());
    assert_eq!(saved[0].priority(), Some(MAX_PRIORITY));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_events_share_handler_instances() {
    let store = InMemoryStore::new();
    let consumer = Arc::new(stack(
        &retry(3, true),
        ListenerRegistry::builder().listener(StandardOutageListener).build(),
        Arc::new(store.clone()),
        MemorySink::new(),
    ));

    let mut tasks = Vec::new();
    for i in 0..30 {
        let consumer = consumer.clone();
        let source = SourceSystem::ALL[i % SourceSystem::ALL.len()];
        tasks.push(tokio::spawn(async move {
            let event = OutageEvent::new(format!("c-{i}"), source, Utc::now()).with_severity(4);
            consumer.consume(event).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.len(), 30);
    assert_eq!(consumer.stats().processed(), 30);
    assert_eq!(consumer.stats().failed(), 0);
}
