//! Consumption boundary.
//!
//! [`OutageEventConsumer::consume`] is what the ingestion loop calls for every event. It
//! resolves the handler for the event's source system, invokes it exactly once and absorbs
//! the outcome: failures are logged and counted, never propagated. Retry, when configured,
//! lives inside the decorated handler, not here.
//!
//! The boundary also contains what the pipeline itself cannot:
//! - an optional per-event deadline ([`OutageError::Timeout`]);
//! - a panicking handler ([`OutageError::HandlerPanicked`]).
//!
//! [`OutageEventConsumer::try_consume`] runs the same path but hands the result back.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use crate::config::ConsumerConfig;
use crate::error::{ConfigError, OutageError};
use crate::event::OutageEvent;
use crate::registry::{self, HandlerRegistry};

/// Outcome counters for a consumer.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl ConsumerStats {
    /// Events whose handler completed successfully.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Events that ended in any failure, including lookup errors, timeouts and panics.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Entry point for processed-event ingestion.
#[derive(Debug, Clone)]
pub struct OutageEventConsumer {
    registry: Arc<HandlerRegistry>,
    timeout: Option<Duration>,
    stats: Arc<ConsumerStats>,
}

impl OutageEventConsumer {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry, timeout: None, stats: Arc::new(ConsumerStats::default()) }
    }

    /// Consumer over the process-wide registry.
    pub fn from_global() -> Result<Self, ConfigError> {
        Ok(Self::new(registry::global()?))
    }

    /// Apply the consumer section of the configuration.
    pub fn with_config(mut self, config: &ConsumerConfig) -> Self {
        self.timeout = config.timeout();
        self
    }

    /// Give up on an event after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Process one event. Never fails; the outcome is logged and counted.
    pub async fn consume(&self, event: OutageEvent) {
        // Failures are already logged and counted by try_consume.
        let _ = self.try_consume(event).await;
    }

    /// Process one event and return its outcome.
    pub async fn try_consume(&self, mut event: OutageEvent) -> Result<(), OutageError> {
        let event_id = event.event_id().to_string();
        info!(
            target: "outage_router::consumer",
            event_id = %event_id,
            source = %event.source_system(),
            "consuming outage event"
        );

        let handler = match self.registry.lookup(event.source_system()) {
            Ok(handler) => handler,
            Err(err) => return Err(self.record_failure(&event_id, err.into())),
        };

        let call = AssertUnwindSafe(handler.handle(&mut event)).catch_unwind();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => settle(outcome, &event_id),
                Err(_) => Err(OutageError::Timeout { event_id: event_id.clone(), timeout: limit }),
            },
            None => settle(call.await, &event_id),
        };

        match result {
            Ok(()) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    target: "outage_router::consumer",
                    event_id = %event_id,
                    handler = handler.name(),
                    "outage event processed"
                );
                Ok(())
            }
            Err(err) => Err(self.record_failure(&event_id, err)),
        }
    }

    fn record_failure(&self, event_id: &str, err: OutageError) -> OutageError {
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        error!(
            target: "outage_router::consumer",
            event_id = %event_id,
            kind = err.as_label(),
            error = %err,
            "error processing outage event"
        );
        err
    }
}

/// Flatten a caught handler outcome, turning a panic into an error.
fn settle(
    outcome: Result<Result<(), OutageError>, Box<dyn Any + Send>>,
    event_id: &str,
) -> Result<(), OutageError> {
    outcome.unwrap_or_else(|panic| {
        error!(
            target: "outage_router::consumer",
            event_id = %event_id,
            panic = %panic_message(panic.as_ref()),
            "handler panicked"
        );
        Err(OutageError::HandlerPanicked { event_id: event_id.to_string() })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
