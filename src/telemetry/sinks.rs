//! Destinations for [`PipelineEvent`]s.
//!
//! A sink is a `tower::Service<PipelineEvent>` so it can be buffered, load-shed or otherwise
//! wrapped with ordinary tower middleware before it is handed to a decorator.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use thiserror::Error;
use tower::{BoxError, ServiceExt};
use tower_service::Service;
use tracing::info;

use super::events::{clamp_u64, PipelineEvent, RetryEvent};

/// Future returned by the bundled sinks.
pub type SinkFuture<E> = BoxFuture<'static, Result<(), E>>;

/// A service that accepts pipeline events.
///
/// Decorators serving concurrent events share one sink, so sinks are `Sync` and cheap to
/// clone.
pub trait TelemetrySink:
    Service<PipelineEvent, Response = (), Error = Self::SinkError> + Clone + Send + Sync + 'static
{
    type SinkError: std::error::Error + Send + 'static;
}

/// Deliver `event` if the sink becomes ready; any sink error is dropped.
///
/// Telemetry never changes the outcome of the pipeline.
pub async fn emit_best_effort<S>(sink: S, event: PipelineEvent)
where
    S: Service<PipelineEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    if let Ok(mut ready) = sink.ready_oneshot().await {
        let _ = ready.call(event).await;
    }
}

fn done() -> SinkFuture<Infallible> {
    future::ready(Ok(())).boxed()
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl Service<PipelineEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: PipelineEvent) -> Self::Future {
        done()
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// Writes each event to `tracing` at INFO with structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl Service<PipelineEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: PipelineEvent) -> Self::Future {
        match &event {
            PipelineEvent::Retry(RetryEvent::Attempt { event_id, attempt }) => info!(
                target: "outage_router::telemetry",
                event_id = %event_id,
                attempt = *attempt,
                "retry scheduled"
            ),
            PipelineEvent::Retry(RetryEvent::Exhausted { event_id, attempts }) => info!(
                target: "outage_router::telemetry",
                event_id = %event_id,
                attempts = *attempts,
                "retries exhausted"
            ),
            PipelineEvent::Timing(record) => info!(
                target: "outage_router::telemetry",
                event_id = %record.event_id,
                handler = %record.handler,
                duration_us = clamp_u64(record.duration.as_micros()),
                outcome = record.outcome.as_str(),
                "handler timing"
            ),
        }
        done()
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// Default ring size of [`MemorySink::new`].
pub const DEFAULT_MEMORY_SINK_CAPACITY: usize = 10_000;

/// Keeps the most recent events in memory.
///
/// Bounded ring: when full, the oldest event is dropped and counted in [`evicted`].
///
/// [`evicted`]: MemorySink::evicted
#[derive(Clone, Debug)]
pub struct MemorySink {
    ring: Arc<Mutex<VecDeque<PipelineEvent>>>,
    limit: usize,
    dropped: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_SINK_CAPACITY)
    }

    /// Ring holding at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let limit = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(VecDeque::with_capacity(limit.min(1024)))),
            limit,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot, oldest first.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.ring().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.ring().clear();
    }

    pub fn len(&self) -> usize {
        self.ring().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.limit
    }

    /// Events dropped to make room since creation.
    pub fn evicted(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn ring(&self) -> MutexGuard<'_, VecDeque<PipelineEvent>> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: PipelineEvent) {
        let mut ring = self.ring();
        while ring.len() >= self.limit {
            ring.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        ring.push_back(event);
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<PipelineEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: PipelineEvent) -> Self::Future {
        self.record(event);
        done()
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

/// Failure of one branch of a [`MulticastSink`].
#[derive(Debug, Error)]
#[error("telemetry sink error: {0}")]
pub struct MulticastSinkError(#[source] BoxError);

/// Delivers every event to two sinks concurrently.
///
/// Both branches always run; the first error (primary before secondary) is reported.
#[derive(Clone, Debug)]
pub struct MulticastSink<A, B> {
    primary: A,
    secondary: B,
}

impl<A, B> MulticastSink<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A, B> Service<PipelineEvent> for MulticastSink<A, B>
where
    A: Service<PipelineEvent, Response = ()> + Clone + Send + 'static,
    A::Error: Into<BoxError> + Send,
    A::Future: Send + 'static,
    B: Service<PipelineEvent, Response = ()> + Clone + Send + 'static,
    B::Error: Into<BoxError> + Send,
    B::Future: Send + 'static,
{
    type Response = ();
    type Error = MulticastSinkError;
    type Future = SinkFuture<MulticastSinkError>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Each branch is driven to readiness inside `call`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: PipelineEvent) -> Self::Future {
        let primary = self.primary.clone().oneshot(event.clone());
        let secondary = self.secondary.clone().oneshot(event);
        async move {
            let (a, b) = future::join(primary, secondary).await;
            a.map_err(|e| MulticastSinkError(e.into()))?;
            b.map_err(|e| MulticastSinkError(e.into()))
        }
        .boxed()
    }
}

impl<A, B> TelemetrySink for MulticastSink<A, B>
where
    A: Service<PipelineEvent, Response = ()> + Clone + Send + Sync + 'static,
    A::Error: Into<BoxError> + Send,
    A::Future: Send + 'static,
    B: Service<PipelineEvent, Response = ()> + Clone + Send + Sync + 'static,
    B::Error: Into<BoxError> + Send,
    B::Future: Send + 'static,
{
    type SinkError = MulticastSinkError;
}
