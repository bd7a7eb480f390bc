//! Handler contract and the fixed five-stage processing template.
//!
//! Every source system gets one handler. A handler runs the same linear pipeline:
//!
//! ```text
//! Validate → Normalize → CalculatePriority → NotifyStakeholders → Persist → Done
//!     └──────────┴──────────────┴───────────────────┴───────────────┴──► Failed(stage, cause)
//! ```
//!
//! The first three stages are source-specific and supplied by an [`OutageHandleTemplate`]
//! implementation. NotifyStakeholders (listener fan-out) and Persist (store) are shared
//! defaults that an implementation may override. [`Pipeline`] drives the stages and is the
//! [`OutageHandler`] that the registry and the decorators see.
//!
//! Semantics:
//! - Stages run strictly in order; there is no branching back.
//! - The first failing stage ends the run; its error bubbles up unchanged.
//! - Normalize must be idempotent, because retry re-runs the whole pipeline on the same event.
//! - CalculatePriority is pure; the pipeline assigns its result to the event.
//! - Handlers hold no per-call state and are shared across concurrent events.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::OutageError;
use crate::event::{OutageEvent, SourceSystem};
use crate::listener::ListenerRegistry;
use crate::store::OutageStore;

mod dms;
mod ems;
mod scada;

pub use dms::{DmsHandler, DMS_MAX_CLOCK_SKEW_SECS};
pub use ems::{EmsHandler, EMS_CRITICAL_SEVERITY};
pub use scada::ScadaHandler;

/// Upper bound of the priority score.
pub const MAX_PRIORITY: u8 = 100;

/// One step of the processing template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Normalize,
    CalculatePriority,
    NotifyStakeholders,
    Persist,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 5] = [
        Stage::Validate,
        Stage::Normalize,
        Stage::CalculatePriority,
        Stage::NotifyStakeholders,
        Stage::Persist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::CalculatePriority => "calculate_priority",
            Stage::NotifyStakeholders => "notify_stakeholders",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Done,
    Failed(Stage),
}

/// The handler contract shared by concrete pipelines and their decorators.
#[async_trait]
pub trait OutageHandler: Send + Sync {
    /// Process one event. Success or failure is reported only through the result.
    async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError>;

    /// Identifying name used in logs and timing records.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn OutageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutageHandler").field("name", &self.name()).finish()
    }
}

#[async_trait]
impl<H: OutageHandler + ?Sized> OutageHandler for Arc<H> {
    async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        (**self).handle(event).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Collaborators injected into every concrete handler.
#[derive(Clone)]
pub struct Collaborators {
    pub listeners: ListenerRegistry,
    pub store: Arc<dyn OutageStore>,
}

impl Collaborators {
    pub fn new(listeners: ListenerRegistry, store: Arc<dyn OutageStore>) -> Self {
        Self { listeners, store }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("listeners", &self.listeners)
            .field("store", &"<store>")
            .finish()
    }
}

/// Source-specific stages of the processing template.
#[async_trait]
pub trait OutageHandleTemplate: Send + Sync {
    /// Source system this handler serves.
    fn source_system(&self) -> SourceSystem;

    fn name(&self) -> &str;

    fn collaborators(&self) -> &Collaborators;

    /// Reject events that break structural invariants.
    fn validate(&self, event: &OutageEvent) -> Result<(), OutageError>;

    /// Default missing fields and clamp values into bounds. Must be idempotent.
    fn normalize(&self, event: &mut OutageEvent) -> Result<(), OutageError>;

    /// Priority score derived only from the event's current fields.
    fn calculate_priority(&self, event: &OutageEvent) -> Result<u8, OutageError>;

    /// Fan the event out to every registered listener.
    async fn notify_stakeholders(&self, event: &OutageEvent) -> Result<(), OutageError> {
        self.collaborators().listeners.publish(event).await
    }

    /// Hand the event to the persistence collaborator.
    async fn persist(&self, event: &OutageEvent) -> Result<(), OutageError> {
        self.collaborators()
            .store
            .save_event(event)
            .await
            .map_err(|e| OutageError::processing_with_source(event.event_id(), Stage::Persist, e))
    }
}

/// Drives an [`OutageHandleTemplate`] through the five stages.
#[derive(Debug, Clone)]
pub struct Pipeline<T> {
    template: T,
}

impl<T: OutageHandleTemplate> Pipeline<T> {
    pub fn new(template: T) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &T {
        &self.template
    }

    async fn run(&self, event: &mut OutageEvent) -> Result<(), (Stage, OutageError)> {
        let t = &self.template;

        self.trace_stage(Stage::Validate, event);
        t.validate(event).map_err(|e| (Stage::Validate, e))?;

        self.trace_stage(Stage::Normalize, event);
        t.normalize(event).map_err(|e| (Stage::Normalize, e))?;

        self.trace_stage(Stage::CalculatePriority, event);
        let priority = t.calculate_priority(event).map_err(|e| (Stage::CalculatePriority, e))?;
        event.set_priority(priority.min(MAX_PRIORITY));

        // From here on the event is only borrowed immutably.
        let event: &OutageEvent = event;

        self.trace_stage(Stage::NotifyStakeholders, event);
        t.notify_stakeholders(event).await.map_err(|e| (Stage::NotifyStakeholders, e))?;

        self.trace_stage(Stage::Persist, event);
        t.persist(event).await.map_err(|e| (Stage::Persist, e))?;

        Ok(())
    }

    fn trace_stage(&self, stage: Stage, event: &OutageEvent) {
        debug!(
            target: "outage_router::handler",
            handler = self.template.name(),
            event_id = %event.event_id(),
            stage = %stage,
            "running stage"
        );
    }
}

#[async_trait]
impl<T: OutageHandleTemplate> OutageHandler for Pipeline<T> {
    async fn handle(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        match self.run(event).await {
            Ok(()) => {
                debug!(
                    target: "outage_router::handler",
                    handler = self.template.name(),
                    event_id = %event.event_id(),
                    state = ?PipelineState::Done,
                    "pipeline finished"
                );
                Ok(())
            }
            Err((stage, err)) => {
                warn!(
                    target: "outage_router::handler",
                    handler = self.template.name(),
                    event_id = %event.event_id(),
                    state = ?PipelineState::Failed(stage),
                    error = %err,
                    "pipeline failed"
                );
                Err(err)
            }
        }
    }

    fn name(&self) -> &str {
        self.template.name()
    }
}

/// Shared structural checks: identifier present and source system matches the handler.
pub fn validate_structure(expected: SourceSystem, event: &OutageEvent) -> Result<(), OutageError> {
    if event.event_id().trim().is_empty() {
        return Err(OutageError::processing(
            event.event_id(),
            Stage::Validate,
            "missing event identifier",
        ));
    }
    if event.source_system() != expected {
        return Err(OutageError::processing(
            event.event_id(),
            Stage::Validate,
            format!(
                "source system mismatch: handler serves {expected}, event is from {}",
                event.source_system()
            ),
        ));
    }
    Ok(())
}

/// Shared normalization: clamp severity, trim the description, and default a blank one.
pub fn normalize_common(event: &mut OutageEvent, default_description: &str) {
    event.clamp_severity();
    let description = match event.description().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default_description.to_string(),
    };
    event.set_description(Some(description));
}

/// `severity * weight`, plus `critical_bonus` for critical events, capped at [`MAX_PRIORITY`].
pub fn weighted_priority(event: &OutageEvent, weight: u32, critical_bonus: u32) -> u8 {
    let severity = u32::try_from(event.severity().max(0)).unwrap_or(0);
    let bonus = if event.is_critical() { critical_bonus } else { 0 };
    let score = severity.saturating_mul(weight).saturating_add(bonus);
    u8::try_from(score.min(u32::from(MAX_PRIORITY))).unwrap_or(MAX_PRIORITY)
}
