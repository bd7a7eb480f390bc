#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Outage Router
//!
//! Routes outage events from upstream grid systems (SCADA, EMS, DMS) through a per-source
//! processing pipeline, with retry and timing applied as explicit decorators and the
//! processed event fanned out to listeners before it is persisted.
//!
//! ## Features
//!
//! - **Fixed five-stage template**: validate, normalize, calculate priority, notify, persist
//! - **Retry decorator** with a validated attempt budget and per-call counters
//! - **Telemetry decorator** producing one timing record per invocation
//! - **Listener fan-out** in registration order, aborting at the first failure
//! - **Sealed registry** built once, then read concurrently without locking
//! - **Consumer boundary** that absorbs failures, with optional timeout and panic containment
//!
//! ## Data flow
//!
//! ```text
//! consume(event)
//!   └─► registry.lookup(source)
//!         └─► Telemetry ∘ Retry ∘ Pipeline<Handler>
//!               validate → normalize → calculate_priority → notify_stakeholders → persist
//!                                                              │                     │
//!                                                       ListenerRegistry        OutageStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use outage_router::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     let store = InMemoryStore::new();
//!     let listeners = ListenerRegistry::builder().listener(StandardOutageListener).build();
//!     let collaborators = Collaborators::new(listeners, Arc::new(store.clone()));
//!
//!     let config = PipelineConfig::default();
//!     let registry = DecoratorFactory::new(&config.retry)?.build_registry(collaborators)?;
//!     let consumer = OutageEventConsumer::new(Arc::new(registry));
//!
//!     let event = OutageEvent::new("42", SourceSystem::Scada, Utc::now()).with_severity(5);
//!     consumer.consume(event).await;
//!
//!     assert_eq!(store.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
pub mod prelude;
pub mod registry;
pub mod retry;
pub mod store;
pub mod telemetry;

// Re-exports
pub use config::{ConsumerConfig, PipelineConfig, RetryConfig};
pub use consumer::{ConsumerStats, OutageEventConsumer};
pub use error::{ConfigError, ErrorKind, OutageError};
pub use event::{OutageEvent, SourceSystem};
pub use handler::{
    Collaborators, DmsHandler, EmsHandler, OutageHandleTemplate, OutageHandler, Pipeline,
    ScadaHandler, Stage,
};
pub use listener::{ListenerRegistry, OutageEventListener};
pub use registry::{DecoratorFactory, HandlerRegistry, HandlerRegistryBuilder};
pub use retry::{RetryHandler, RetryLayer};
pub use store::{InMemoryStore, LogStore, OutageStore};
pub use telemetry::{TelemetryHandler, TelemetryLayer};
