//! Convenient re-exports for wiring an outage pipeline.
pub use crate::{
    config::{ConsumerConfig, PipelineConfig, RetryConfig},
    consumer::{ConsumerStats, OutageEventConsumer},
    error::{ConfigError, ErrorKind, OutageError},
    event::{OutageEvent, SourceSystem, MAX_SEVERITY, MIN_SEVERITY},
    handler::{
        Collaborators, DmsHandler, EmsHandler, OutageHandleTemplate, OutageHandler, Pipeline,
        ScadaHandler, Stage, MAX_PRIORITY,
    },
    listener::{
        CriticalOutageListener, ListenerRegistry, ListenerRegistryBuilder, OutageEventListener,
        StandardOutageListener,
    },
    registry::{global, install_global, DecoratorFactory, HandlerRegistry, HandlerRegistryBuilder},
    retry::{RetryHandler, RetryLayer},
    store::{InMemoryStore, LogStore, OutageStore},
    telemetry::{
        LogSink, MemorySink, MulticastSink, NullSink, PipelineEvent, TelemetryHandler,
        TelemetryLayer, TelemetrySink,
    },
};
