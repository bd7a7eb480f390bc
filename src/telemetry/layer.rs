//! Timing decorator.
//!
//! Semantics:
//! - One span per outer invocation. Placed outside the retry decorator, every attempt is
//!   covered by a single timing record rather than re-timed per attempt.
//! - The record is emitted on success and on failure, before the result is returned.
//! - A call abandoned before the delegate returns (an outer timeout dropping the future, or a
//!   panic unwinding through it) still emits one [`Outcome::Failure`] record.
//! - Any delegate failure is translated into [`OutageError::Telemetry`], so callers see one
//!   error kind regardless of the stage that failed. The delegate's error stays reachable via
//!   `source()` but is not re-signalled.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tower_layer::Layer;
use tracing::{error, info, warn};

use super::events::{clamp_u64, Outcome, PipelineEvent, TimingRecord};
use super::sinks::{emit_best_effort, NullSink, TelemetrySink};
use crate::error::OutageError;
use crate::event::OutageEvent;
use crate::handler::OutageHandler;

/// Layer producing [`TelemetryHandler`].
#[derive(Clone, Debug, Default)]
pub struct TelemetryLayer<S = NullSink> {
    sink: S,
}

impl TelemetryLayer<NullSink> {
    /// Telemetry that only logs; timing records are not forwarded anywhere.
    pub fn new() -> Self {
        Self { sink: NullSink }
    }
}

impl<S> TelemetryLayer<S> {
    /// Forward timing records to `sink`.
    pub fn with_sink<T>(self, sink: T) -> TelemetryLayer<T> {
        TelemetryLayer { sink }
    }
}

impl<H, S: Clone> Layer<H> for TelemetryLayer<S> {
    type Service = TelemetryHandler<H, S>;

    fn layer(&self, inner: H) -> Self::Service {
        TelemetryHandler { inner, sink: self.sink.clone() }
    }
}

/// Handler decorator that times each invocation of its delegate.
#[derive(Clone, Debug)]
pub struct TelemetryHandler<H, S = NullSink> {
    inner: H,
    sink: S,
}

impl<H> TelemetryHandler<H, NullSink> {
    pub fn new(inner: H) -> Self {
        Self { inner, sink: NullSink }
    }
}

impl<H, S> TelemetryHandler<H, S> {
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H, S> OutageHandler for TelemetryHandler<H, S>
where
    H: OutageHandler,
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        let event_id = event.event_id().to_string();
        let handler = self.inner.name().to_string();
        let mut pending = PendingRecord::new(self.sink.clone(), event_id.clone(), handler.clone());

        info!(
            target: "outage_router::telemetry",
            event_id = %event_id,
            handler = %handler,
            started_at = %pending.started_at,
            "start handling event"
        );

        let result = self.inner.handle(event).await;
        pending.disarm();

        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        let record = pending.record(outcome);

        match &result {
            Ok(()) => info!(
                target: "outage_router::telemetry",
                event_id = %event_id,
                handler = %handler,
                finished_at = %record.finished_at,
                duration_ms = clamp_u64(record.duration.as_millis()),
                "finished handling event"
            ),
            Err(err) => error!(
                target: "outage_router::telemetry",
                event_id = %event_id,
                handler = %handler,
                duration_ms = clamp_u64(record.duration.as_millis()),
                error = %err,
                "error handling event"
            ),
        }

        emit_best_effort(self.sink.clone(), PipelineEvent::Timing(record)).await;

        result.map_err(|source| OutageError::Telemetry {
            event_id,
            handler,
            source: Box::new(source),
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Timing state of one in-flight invocation.
///
/// Dropped while still armed, it emits a failure record for the abandoned call.
struct PendingRecord<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    sink: S,
    event_id: String,
    handler: String,
    started_at: DateTime<Utc>,
    start: Instant,
    armed: bool,
}

impl<S> PendingRecord<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    fn new(sink: S, event_id: String, handler: String) -> Self {
        Self { sink, event_id, handler, started_at: Utc::now(), start: Instant::now(), armed: true }
    }

    /// The delegate returned; the caller emits the record itself.
    fn disarm(&mut self) {
        self.armed = false;
    }

    fn record(&self, outcome: Outcome) -> TimingRecord {
        TimingRecord {
            event_id: self.event_id.clone(),
            handler: self.handler.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.start.elapsed(),
            outcome,
        }
    }
}

impl<S> Drop for PendingRecord<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let record = self.record(Outcome::Failure);
        warn!(
            target: "outage_router::telemetry",
            event_id = %self.event_id,
            handler = %self.handler,
            duration_ms = clamp_u64(record.duration.as_millis()),
            "handling abandoned before completion"
        );

        // Synchronous sinks finish here; anything still pending moves to the runtime.
        let mut emit = emit_best_effort(self.sink.clone(), PipelineEvent::Timing(record)).boxed();
        if emit.as_mut().now_or_never().is_none() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(emit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::SourceSystem;
    use crate::handler::Stage;
    use crate::telemetry::sinks::MemorySink;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Scripted {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl OutageHandler for Scripted {
        async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(OutageError::processing(event.event_id(), Stage::Persist, "disk full"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Never completes.
    struct Stalled;

    #[async_trait]
    impl OutageHandler for Stalled {
        async fn handle(&self, _event: &mut OutageEvent) -> Result<(), OutageError> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    fn event() -> OutageEvent {
        OutageEvent::new("42", SourceSystem::Scada, Utc::now())
    }

    #[tokio::test]
    async fn success_emits_one_timing_record() {
        let sink = MemorySink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = TelemetryLayer::new()
            .with_sink(sink.clone())
            .layer(Scripted { calls: calls.clone(), fail: false });

        handler.handle(&mut event()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PipelineEvent::Timing(record) => {
                assert_eq!(record.event_id, "42");
                assert_eq!(record.handler, "scripted");
                assert_eq!(record.outcome, Outcome::Success);
                assert!(record.finished_at >= record.started_at);
            }
            other => panic!("expected timing record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_is_translated_and_still_timed() {
        let sink = MemorySink::new();
        let handler = TelemetryLayer::new()
            .with_sink(sink.clone())
            .layer(Scripted { calls: Arc::new(AtomicUsize::new(0)), fail: true });

        let err = handler.handle(&mut event()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Telemetry);
        assert_eq!(err.event_id(), Some("42"));
        assert!(err.source().unwrap().to_string().contains("disk full"));
        assert!(matches!(
            sink.events().as_slice(),
            [PipelineEvent::Timing(TimingRecord { outcome: Outcome::Failure, .. })]
        ));
    }

    #[tokio::test]
    async fn reports_delegate_name() {
        let handler =
            TelemetryHandler::new(Scripted { calls: Arc::new(AtomicUsize::new(0)), fail: false });
        assert_eq!(handler.name(), "scripted");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_emits_failure_record() {
        let sink = MemorySink::new();
        let handler = TelemetryLayer::new().with_sink(sink.clone()).layer(Stalled);
        let mut ev = event();

        let outcome = tokio::time::timeout(Duration::from_millis(50), handler.handle(&mut ev)).await;

        assert!(outcome.is_err());
        match sink.events().as_slice() {
            [PipelineEvent::Timing(record)] => {
                assert_eq!(record.event_id, "42");
                assert_eq!(record.handler, "stalled");
                assert_eq!(record.outcome, Outcome::Failure);
            }
            other => panic!("expected one timing record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_call_emits_exactly_one_record() {
        let sink = MemorySink::new();
        let handler = TelemetryLayer::new()
            .with_sink(sink.clone())
            .layer(Scripted { calls: Arc::new(AtomicUsize::new(0)), fail: true });

        let _ = handler.handle(&mut event()).await;

        assert_eq!(sink.len(), 1);
    }
}
