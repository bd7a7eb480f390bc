use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Structured telemetry emitted while an outage event is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Retry decorator events
    Retry(RetryEvent),
    /// One timing span around a full handler invocation
    Timing(TimingRecord),
}

/// Events emitted by the retry decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// A failed attempt is about to be retried.
    Attempt {
        event_id: String,
        /// The attempt number about to run (1-indexed)
        attempt: u32,
    },
    /// Every attempt failed.
    Exhausted { event_id: String, attempts: u32 },
}

/// Result of a timed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Timing of one handler invocation, as seen by the telemetry decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord {
    pub event_id: String,
    /// Name of the delegate handler.
    pub handler: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: Outcome,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Retry(event) => write!(f, "Retry::{}", event),
            PipelineEvent::Timing(record) => write!(f, "Timing::{}", record),
        }
    }
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryEvent::Attempt { event_id, attempt } => {
                write!(f, "Attempt(event={}, #{})", event_id, attempt)
            }
            RetryEvent::Exhausted { event_id, attempts } => {
                write!(f, "Exhausted(event={}, attempts={})", event_id, attempts)
            }
        }
    }
}

impl fmt::Display for TimingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(event={}, handler={}, duration={:?})",
            match self.outcome {
                Outcome::Success => "Success",
                Outcome::Failure => "Failure",
            },
            self.event_id,
            self.handler,
            self.duration
        )
    }
}

#[inline]
pub(crate) fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a PipelineEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &PipelineEvent) -> serde_json::Value {
    match event {
        PipelineEvent::Retry(RetryEvent::Attempt { event_id, attempt }) => json!({
            "kind": "retry_attempt",
            "event_id": event_id,
            "attempt": attempt,
        }),
        PipelineEvent::Retry(RetryEvent::Exhausted { event_id, attempts }) => json!({
            "kind": "retry_exhausted",
            "event_id": event_id,
            "attempts": attempts,
        }),
        PipelineEvent::Timing(record) => json!({
            "kind": "timing",
            "event_id": record.event_id,
            "handler": record.handler,
            "started_at": record.started_at.to_rfc3339(),
            "finished_at": record.finished_at.to_rfc3339(),
            "duration_us": clamp_u64(record.duration.as_micros()),
            "outcome": record.outcome.as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: Outcome) -> TimingRecord {
        let now = Utc::now();
        TimingRecord {
            event_id: "42".into(),
            handler: "ScadaHandler".into(),
            started_at: now,
            finished_at: now,
            duration: Duration::from_millis(3),
            outcome,
        }
    }

    #[test]
    fn display_formats() {
        let attempt = PipelineEvent::Retry(RetryEvent::Attempt { event_id: "1".into(), attempt: 2 });
        assert_eq!(attempt.to_string(), "Retry::Attempt(event=1, #2)");
        let exhausted =
            PipelineEvent::Retry(RetryEvent::Exhausted { event_id: "1".into(), attempts: 3 });
        assert_eq!(exhausted.to_string(), "Retry::Exhausted(event=1, attempts=3)");
        let timing = PipelineEvent::Timing(record(Outcome::Failure));
        assert_eq!(timing.to_string(), "Timing::Failure(event=42, handler=ScadaHandler, duration=3ms)");
    }

    #[test]
    fn clamp_u64_saturates() {
        assert_eq!(clamp_u64(5), 5);
        assert_eq!(clamp_u64(u128::MAX), u64::MAX);
    }

    #[cfg(feature = "telemetry-json")]
    #[test]
    fn timing_to_json() {
        let value = event_to_json(&PipelineEvent::Timing(record(Outcome::Success)));
        assert_eq!(value["kind"], "timing");
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["duration_us"], 3000);
    }
}
