//! Retry decorator.
//!
//! Re-invokes a wrapped handler when it fails, up to a fixed budget.
//!
//! Semantics:
//! - `max_retries` counts total attempts (initial try + retries) and must be > 0; a zero
//!   budget is rejected when the layer is built, never at call time.
//! - Attempts run back-to-back with no backoff.
//! - Each invocation owns its attempt counter; nothing is shared between concurrent events.
//! - Configuration errors are returned as-is and never retried.
//! - When the budget is spent the result is [`OutageError::MaxRetriesExceeded`]; the final
//!   attempt's error is kept as its `source()`.
//!
//! Invariants:
//! - Attempts never exceed `max_retries`.
//! - A success returns immediately; no further attempts run.
//!
//! Example
//! ```rust
//! use outage_router::retry::RetryLayer;
//!
//! let layer = RetryLayer::new(3).expect("positive budget");
//! assert_eq!(layer.max_retries(), 3);
//! assert!(RetryLayer::new(0).is_err());
//! ```

use async_trait::async_trait;
use tower_layer::Layer;
use tracing::{error, info};

use crate::error::{ConfigError, OutageError};
use crate::event::OutageEvent;
use crate::handler::OutageHandler;
use crate::telemetry::{emit_best_effort, NullSink, PipelineEvent, RetryEvent, TelemetrySink};

/// Default attempt budget.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Layer producing [`RetryHandler`].
#[derive(Clone, Debug)]
pub struct RetryLayer<S = NullSink> {
    max_retries: u32,
    sink: S,
}

impl RetryLayer<NullSink> {
    /// Build a retry layer, validating the budget.
    pub fn new(max_retries: u32) -> Result<Self, ConfigError> {
        if max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(max_retries));
        }
        Ok(Self { max_retries, sink: NullSink })
    }
}

impl<S> RetryLayer<S> {
    /// Forward retry events to `sink`.
    pub fn with_sink<T>(self, sink: T) -> RetryLayer<T> {
        RetryLayer { max_retries: self.max_retries, sink }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl<H, S: Clone> Layer<H> for RetryLayer<S> {
    type Service = RetryHandler<H, S>;

    fn layer(&self, inner: H) -> Self::Service {
        RetryHandler { inner, max_retries: self.max_retries, sink: self.sink.clone() }
    }
}

/// Handler decorator that retries its delegate on failure.
#[derive(Clone, Debug)]
pub struct RetryHandler<H, S = NullSink> {
    inner: H,
    max_retries: u32,
    sink: S,
}

impl<H> RetryHandler<H, NullSink> {
    pub fn new(inner: H, max_retries: u32) -> Result<Self, ConfigError> {
        Ok(RetryLayer::new(max_retries)?.layer(inner))
    }
}

impl<H, S> RetryHandler<H, S> {
    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[async_trait]
impl<H, S> OutageHandler for RetryHandler<H, S>
where
    H: OutageHandler,
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            info!(
                target: "outage_router::retry",
                event_id = %event.event_id(),
                attempt,
                max_retries = self.max_retries,
                "attempting to handle event"
            );

            let err = match self.inner.handle(event).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_config() => return Err(err),
                Err(err) => err,
            };

            error!(
                target: "outage_router::retry",
                event_id = %event.event_id(),
                attempt,
                error = %err,
                "error handling event"
            );

            if attempt >= self.max_retries {
                error!(
                    target: "outage_router::retry",
                    event_id = %event.event_id(),
                    attempts = attempt,
                    "max retries reached; failing the operation"
                );
                emit_best_effort(
                    self.sink.clone(),
                    PipelineEvent::Retry(RetryEvent::Exhausted {
                        event_id: event.event_id().to_string(),
                        attempts: attempt,
                    }),
                )
                .await;
                return Err(OutageError::MaxRetriesExceeded {
                    event_id: event.event_id().to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            emit_best_effort(
                self.sink.clone(),
                PipelineEvent::Retry(RetryEvent::Attempt {
                    event_id: event.event_id().to_string(),
                    attempt: attempt + 1,
                }),
            )
            .await;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
