//! Telemetry for the outage pipeline.
//!
//! The decorators emit structured [`PipelineEvent`]s describing what happened to each outage
//! event. Events flow through [`TelemetrySink`] implementations which can log, buffer, or
//! forward them. Sinks are `tower::Service<PipelineEvent>` so they compose with standard
//! tower tooling; no metrics backend is bundled, these are the hook points.
//!
//! # Event Types
//!
//! - **Retry**: `RetryEvent::Attempt`, `RetryEvent::Exhausted`
//! - **Timing**: one `TimingRecord` per outer handler invocation, success or failure
//!
//! ```rust
//! use outage_router::telemetry::{PipelineEvent, RetryEvent};
//!
//! let event = PipelineEvent::Retry(RetryEvent::Attempt { event_id: "42".into(), attempt: 2 });
//! assert_eq!(event.to_string(), "Retry::Attempt(event=42, #2)");
//! ```

pub mod events;
pub mod layer;
pub mod sinks;

pub use events::{Outcome, PipelineEvent, RetryEvent, TimingRecord};
pub use layer::{TelemetryHandler, TelemetryLayer};
pub use sinks::{
    emit_best_effort, LogSink, MemorySink, MulticastSink, MulticastSinkError, NullSink,
    SinkFuture, TelemetrySink,
};
