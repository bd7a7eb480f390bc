//! Error types for the outage pipeline.
//!
//! Every failure raised while processing an event carries the event identifier so it can be
//! traced end to end. Wrapping layers translate errors (retry exhausts, telemetry normalizes)
//! but never drop the identifier.
//!
//! [`ConfigError`] is kept apart: it signals a deployment mismatch (unknown source system,
//! invalid retry budget) and must never be retried.

use std::time::Duration;

use thiserror::Error;
use tower::BoxError;

use crate::handler::Stage;

/// Errors raised at configuration or startup time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_retries` must be a positive integer.
    #[error("max_retries must be > 0 (got {0})")]
    InvalidMaxRetries(u32),
    /// No handler is registered for the requested source-system tag.
    #[error("no handler registered for source system '{tag}'")]
    UnknownSourceSystem {
        /// Tag that could not be resolved.
        tag: String,
    },
    /// Two handlers were registered for the same source system.
    #[error("duplicate handler registration for source system '{tag}'")]
    DuplicateHandler {
        /// Tag registered more than once.
        tag: String,
    },
    /// A declared source system has no handler at registry init.
    #[error("no handler registered for declared source system '{tag}'")]
    MissingHandler {
        /// Declared tag left without a handler.
        tag: String,
    },
    /// The process-wide registry slot was already filled.
    #[error("handler registry already installed")]
    RegistryAlreadyInstalled,
    /// The process-wide registry was read before it was installed.
    #[error("handler registry not installed")]
    RegistryNotInstalled,
    /// A configuration source could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Coarse classification of [`OutageError`], stable for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Processing,
    MaxRetriesExceeded,
    Telemetry,
    Publish,
    Timeout,
    HandlerPanicked,
    Config,
}

/// Unified error type for the outage pipeline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OutageError {
    /// A template stage rejected the event or could not complete.
    #[error("processing of event '{event_id}' failed at {stage}: {reason}")]
    Processing {
        event_id: String,
        stage: Stage,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The retry budget was spent without a successful attempt.
    #[error("max retries reached for event '{event_id}' after {attempts} attempts")]
    MaxRetriesExceeded {
        event_id: String,
        attempts: u32,
        /// Failure of the final attempt, kept for diagnostics only.
        #[source]
        last: Box<OutageError>,
    },

    /// The telemetry layer's uniform translation of any downstream failure.
    #[error("telemetry: error handling event '{event_id}' with handler {handler}")]
    Telemetry {
        event_id: String,
        handler: String,
        #[source]
        source: Box<OutageError>,
    },

    /// A listener failed during fan-out; remaining listeners were skipped.
    #[error("error while notifying listener '{listener}' of event '{event_id}'")]
    Publish {
        event_id: String,
        listener: String,
        #[source]
        source: BoxError,
    },

    /// The consumer boundary gave up waiting for the handler.
    #[error("handling of event '{event_id}' timed out after {timeout:?}")]
    Timeout { event_id: String, timeout: Duration },

    /// The handler panicked; the panic was contained at the consumer boundary.
    #[error("handler panicked while processing event '{event_id}'")]
    HandlerPanicked { event_id: String },

    /// Configuration or deployment mismatch.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OutageError {
    /// Build a processing failure with no underlying cause.
    pub fn processing(event_id: impl Into<String>, stage: Stage, reason: impl Into<String>) -> Self {
        OutageError::Processing {
            event_id: event_id.into(),
            stage,
            reason: reason.into(),
            source: None,
        }
    }

    /// Build a processing failure wrapping the collaborator error that caused it.
    pub fn processing_with_source(
        event_id: impl Into<String>,
        stage: Stage,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        OutageError::Processing {
            event_id: event_id.into(),
            stage,
            reason: source.to_string(),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Processing { .. } => ErrorKind::Processing,
            Self::MaxRetriesExceeded { .. } => ErrorKind::MaxRetriesExceeded,
            Self::Telemetry { .. } => ErrorKind::Telemetry,
            Self::Publish { .. } => ErrorKind::Publish,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HandlerPanicked { .. } => ErrorKind::HandlerPanicked,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Identifier of the event this error belongs to. `None` only for configuration errors.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Processing { event_id, .. }
            | Self::MaxRetriesExceeded { event_id, .. }
            | Self::Telemetry { event_id, .. }
            | Self::Publish { event_id, .. }
            | Self::Timeout { event_id, .. }
            | Self::HandlerPanicked { event_id } => Some(event_id),
            Self::Config(_) => None,
        }
    }

    /// Stage-local failures are retryable; terminal and configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Processing { .. } | Self::Publish { .. })
    }

    /// Stage at which a processing failure occurred.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Processing { stage, .. } => Some(*stage),
            Self::Publish { .. } => Some(Stage::NotifyStakeholders),
            _ => None,
        }
    }

    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Processing => "outage_processing",
            ErrorKind::MaxRetriesExceeded => "outage_max_retries",
            ErrorKind::Telemetry => "outage_telemetry",
            ErrorKind::Publish => "outage_publish",
            ErrorKind::Timeout => "outage_timeout",
            ErrorKind::HandlerPanicked => "outage_handler_panicked",
            ErrorKind::Config => "outage_config",
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The pipeline error wrapped by a translating layer, if any.
    pub fn wrapped(&self) -> Option<&OutageError> {
        match self {
            Self::MaxRetriesExceeded { last, .. } => Some(&**last),
            Self::Telemetry { source, .. } => Some(&**source),
            _ => None,
        }
    }

    /// Innermost pipeline error, following [`wrapped`](Self::wrapped) to the end.
    pub fn root_cause(&self) -> &OutageError {
        let mut current = self;
        while let Some(inner) = current.wrapped() {
            current = inner;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn processing_display_names_stage_and_event() {
        let err = OutageError::processing("42", Stage::Validate, "missing identifier");
        let msg = err.to_string();
        assert!(msg.contains("'42'"));
        assert!(msg.contains("validate"));
        assert!(msg.contains("missing identifier"));
        assert_eq!(err.kind(), ErrorKind::Processing);
        assert!(err.is_retryable());
    }

    #[test]
    fn max_retries_keeps_last_cause_as_source() {
        let last = OutageError::processing("7", Stage::Persist, "db down");
        let err = OutageError::MaxRetriesExceeded {
            event_id: "7".into(),
            attempts: 3,
            last: Box::new(last),
        };
        assert!(err.to_string().contains("max retries reached"));
        let source = err.source().expect("source");
        assert!(source.to_string().contains("db down"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn every_variant_reports_event_id_except_config() {
        let errors = vec![
            OutageError::processing("a", Stage::Normalize, "x"),
            OutageError::Timeout { event_id: "a".into(), timeout: Duration::from_millis(5) },
            OutageError::HandlerPanicked { event_id: "a".into() },
            OutageError::Publish {
                event_id: "a".into(),
                listener: "l".into(),
                source: "boom".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.event_id(), Some("a"), "{err}");
        }
        let config: OutageError = ConfigError::InvalidMaxRetries(0).into();
        assert_eq!(config.event_id(), None);
        assert!(config.is_config());
        assert_eq!(config.as_label(), "outage_config");
    }

    #[test]
    fn root_cause_unwraps_translating_layers() {
        let err = OutageError::Telemetry {
            event_id: "8".into(),
            handler: "ScadaHandler".into(),
            source: Box::new(OutageError::MaxRetriesExceeded {
                event_id: "8".into(),
                attempts: 2,
                last: Box::new(OutageError::processing("8", Stage::Persist, "db down")),
            }),
        };
        assert_eq!(err.wrapped().map(OutageError::kind), Some(ErrorKind::MaxRetriesExceeded));
        assert_eq!(err.root_cause().stage(), Some(Stage::Persist));

        let plain = OutageError::HandlerPanicked { event_id: "8".into() };
        assert!(plain.wrapped().is_none());
        assert_eq!(plain.root_cause().kind(), ErrorKind::HandlerPanicked);
    }

    #[test]
    fn unknown_source_message_names_tag() {
        let err = ConfigError::UnknownSourceSystem { tag: "UNKNOWN".into() };
        assert_eq!(err.to_string(), "no handler registered for source system 'UNKNOWN'");
    }

    #[test]
    fn missing_handler_message_names_declared_tag() {
        let err = ConfigError::MissingHandler { tag: "EMS".into() };
        assert_eq!(err.to_string(), "no handler registered for declared source system 'EMS'");
        assert!(OutageError::from(err).is_config());
    }

    #[test]
    fn publish_error_maps_to_notify_stage() {
        let err = OutageError::Publish {
            event_id: "1".into(),
            listener: "pager".into(),
            source: "offline".into(),
        };
        assert_eq!(err.stage(), Some(Stage::NotifyStakeholders));
        assert_eq!(err.source().map(|s| s.to_string()), Some("offline".to_string()));
    }
}
