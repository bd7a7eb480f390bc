//! Source-system → handler registry.
//!
//! Two-phase lifecycle:
//! 1. **Build**: [`HandlerRegistryBuilder::register`] pairs each source system with its
//!    (usually decorated) handler. Single-threaded, registrations only.
//! 2. **Serve**: [`HandlerRegistryBuilder::init`] seals the set into a [`HandlerRegistry`].
//!    The sealed registry has no mutating API, so lookups need no locking and are safe for
//!    any number of concurrent callers.
//!
//! An unknown tag at lookup is a [`ConfigError`], never a per-event processing failure.
//!
//! [`DecoratorFactory`] builds the `Telemetry ∘ Retry ∘ handler` chain from configuration,
//! and [`install_global`] / [`global`] expose one sealed registry process-wide.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tower::ServiceBuilder;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::ConfigError;
use crate::event::SourceSystem;
use crate::handler::{Collaborators, DmsHandler, EmsHandler, OutageHandler, Pipeline, ScadaHandler};
use crate::retry::RetryLayer;
use crate::telemetry::{NullSink, TelemetryLayer, TelemetrySink};

/// Build phase of the handler registry.
///
/// The declared source systems default to [`SourceSystem::ALL`]; every declared source must
/// receive exactly one handler before [`init`](Self::init) succeeds.
pub struct HandlerRegistryBuilder {
    declared: Vec<SourceSystem>,
    entries: Vec<(SourceSystem, Arc<dyn OutageHandler>)>,
}

impl Default for HandlerRegistryBuilder {
    fn default() -> Self {
        Self { declared: SourceSystem::ALL.to_vec(), entries: Vec::new() }
    }
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the declared source-system set.
    pub fn declare(mut self, sources: &[SourceSystem]) -> Self {
        self.declared = sources.to_vec();
        self
    }

    /// Register `handler` for `source`.
    pub fn register<H>(self, source: SourceSystem, handler: H) -> Self
    where
        H: OutageHandler + 'static,
    {
        self.register_shared(source, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_shared(mut self, source: SourceSystem, handler: Arc<dyn OutageHandler>) -> Self {
        self.entries.push((source, handler));
        self
    }

    /// Seal the registrations.
    ///
    /// Fails on a duplicate registration and on a declared source without a handler.
    /// Handlers for undeclared sources are kept but logged.
    pub fn init(self) -> Result<HandlerRegistry, ConfigError> {
        let mut handlers: HashMap<SourceSystem, Arc<dyn OutageHandler>> =
            HashMap::with_capacity(self.entries.len());
        for (source, handler) in self.entries {
            if handlers.contains_key(&source) {
                return Err(ConfigError::DuplicateHandler { tag: source.to_string() });
            }
            if !self.declared.contains(&source) {
                warn!(
                    target: "outage_router::registry",
                    source = %source,
                    handler = handler.name(),
                    "handler registered for undeclared source system"
                );
            }
            info!(
                target: "outage_router::registry",
                source = %source,
                handler = handler.name(),
                "registered outage handler"
            );
            handlers.insert(source, handler);
        }

        if let Some(missing) = self.declared.iter().find(|s| !handlers.contains_key(*s)) {
            return Err(ConfigError::MissingHandler { tag: missing.to_string() });
        }

        Ok(HandlerRegistry { handlers })
    }
}

/// Sealed, read-only mapping from source system to handler.
pub struct HandlerRegistry {
    handlers: HashMap<SourceSystem, Arc<dyn OutageHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<(SourceSystem, &str)> =
            self.sources().into_iter().map(|s| (s, self.handlers[&s].name())).collect();
        f.debug_struct("HandlerRegistry").field("handlers", &entries).finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// The handler registered for `source`; the same instance on every call.
    pub fn lookup(&self, source: SourceSystem) -> Result<Arc<dyn OutageHandler>, ConfigError> {
        self.handlers
            .get(&source)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSourceSystem { tag: source.to_string() })
    }

    /// Lookup by raw tag (case-insensitive).
    pub fn lookup_tag(&self, tag: &str) -> Result<Arc<dyn OutageHandler>, ConfigError> {
        let source: SourceSystem = tag
            .parse()
            .map_err(|_| ConfigError::UnknownSourceSystem { tag: tag.to_string() })?;
        self.lookup(source)
    }

    /// Registered source systems, sorted.
    pub fn sources(&self) -> Vec<SourceSystem> {
        let mut sources: Vec<SourceSystem> = self.handlers.keys().copied().collect();
        sources.sort();
        sources
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// Install `registry` as the process-wide registry. Only the first call succeeds.
pub fn install_global(registry: HandlerRegistry) -> Result<Arc<HandlerRegistry>, ConfigError> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(registry.clone())
        .map_err(|_| ConfigError::RegistryAlreadyInstalled)?;
    info!(target: "outage_router::registry", sources = ?registry.sources(), "registry installed");
    Ok(registry)
}

/// The process-wide registry.
pub fn global() -> Result<Arc<HandlerRegistry>, ConfigError> {
    GLOBAL_REGISTRY.get().cloned().ok_or(ConfigError::RegistryNotInstalled)
}

/// Wraps handlers in `Telemetry ∘ Retry`, as configured.
///
/// Telemetry is always the outer layer so one timing record covers every retry attempt.
/// With retry disabled the retry layer is left out entirely.
#[derive(Clone, Debug)]
pub struct DecoratorFactory<S = NullSink> {
    retry: Option<RetryLayer<S>>,
    telemetry: TelemetryLayer<S>,
}

impl DecoratorFactory<NullSink> {
    /// Validates the retry budget when retry is enabled.
    pub fn new(config: &RetryConfig) -> Result<Self, ConfigError> {
        let retry = if config.enabled { Some(RetryLayer::new(config.max_retries)?) } else { None };
        Ok(Self { retry, telemetry: TelemetryLayer::new() })
    }
}

impl<S: Clone> DecoratorFactory<S> {
    /// Route retry and timing events of every decorated handler to `sink`.
    pub fn with_sink<T: Clone>(self, sink: T) -> DecoratorFactory<T> {
        DecoratorFactory {
            retry: self.retry.map(|layer| layer.with_sink(sink.clone())),
            telemetry: self.telemetry.with_sink(sink),
        }
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry.is_some()
    }
}

impl<S> DecoratorFactory<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    pub fn decorate<H>(&self, handler: H) -> Arc<dyn OutageHandler>
    where
        H: OutageHandler + 'static,
    {
        if let Some(retry) = &self.retry {
            return Arc::new(
                ServiceBuilder::new()
                    .layer(self.telemetry.clone())
                    .layer(retry.clone())
                    .service(handler),
            );
        }
        Arc::new(ServiceBuilder::new().layer(self.telemetry.clone()).service(handler))
    }

    /// Sealed registry with the SCADA, EMS and DMS handlers, each decorated.
    pub fn build_registry(&self, collaborators: Collaborators) -> Result<HandlerRegistry, ConfigError> {
        HandlerRegistry::builder()
            .register_shared(
                SourceSystem::Scada,
                self.decorate(Pipeline::new(ScadaHandler::new(collaborators.clone()))),
            )
            .register_shared(
                SourceSystem::Ems,
                self.decorate(Pipeline::new(EmsHandler::new(collaborators.clone()))),
            )
            .register_shared(
                SourceSystem::Dms,
                self.decorate(Pipeline::new(DmsHandler::new(collaborators))),
            )
            .init()
    }
}
