//! Persistence collaborator interface.
//!
//! The pipeline's Persist stage hands the finished event to an [`OutageStore`]. A save is
//! expected to be all-or-nothing from the caller's perspective; any error is surfaced as a
//! processing failure at the Persist stage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tower::BoxError;
use tracing::info;

use crate::event::OutageEvent;

/// Destination for processed outage events.
#[async_trait]
pub trait OutageStore: Send + Sync {
    /// Persist one processed event.
    async fn save_event(&self, event: &OutageEvent) -> Result<(), BoxError>;
}

/// Store that only logs the event via tracing.
#[derive(Clone, Debug, Default)]
pub struct LogStore;

#[async_trait]
impl OutageStore for LogStore {
    async fn save_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        info!(
            target: "outage_router::store",
            event_id = %event.event_id(),
            source = %event.source_system(),
            priority = ?event.priority(),
            "saving outage event"
        );
        Ok(())
    }
}

/// In-memory store (tests / diagnostics).
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    events: Arc<Mutex<Vec<OutageEvent>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of saved events in save order.
    pub fn events(&self) -> Vec<OutageEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutageStore for InMemoryStore {
    async fn save_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl<T: OutageStore + ?Sized> OutageStore for Arc<T> {
    async fn save_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        (**self).save_event(event).await
    }
}
