//! # Listener fan-out
//!
//! [`ListenerRegistry`] delivers each processed event to every registered
//! [`OutageEventListener`], one after another, in registration order.
//!
//! ## Delivery policy
//! - Sequential: each `on_event` is awaited before the next listener is called.
//! - Abort on first failure: the failing listener's error is returned as
//!   [`OutageError::Publish`] and the remaining listeners are **not** called.
//! - No rollback: listeners notified before the failure keep the notification, so
//!   listeners must tolerate re-delivery when the pipeline is retried.
//!
//! ```text
//!   publish(&event)
//!       ├─► L1.on_event() ok
//!       ├─► L2.on_event() err ──► OutageError::Publish { listener: "L2", .. }
//!       └─x L3 never called
//! ```
//!
//! The set is assembled once through [`ListenerRegistryBuilder`] and is immutable afterwards,
//! so `publish` iterates without locking.

use std::sync::Arc;

use async_trait::async_trait;
use tower::BoxError;
use tracing::{debug, error, info, warn};

use crate::error::OutageError;
use crate::event::OutageEvent;

/// Observer of processed outage events.
#[async_trait]
pub trait OutageEventListener: Send + Sync {
    /// React to a processed event. An error aborts the remaining fan-out.
    async fn on_event(&self, event: &OutageEvent) -> Result<(), BoxError>;

    /// Short name used in logs and publish errors.
    fn name(&self) -> &str;
}

/// Ordered, immutable set of listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Vec<Arc<dyn OutageEventListener>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry").field("listeners", &self.names()).finish()
    }
}

impl ListenerRegistry {
    pub fn builder() -> ListenerRegistryBuilder {
        ListenerRegistryBuilder::default()
    }

    /// Registry with no listeners; `publish` is a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listener names in delivery order.
    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    /// Deliver `event` to every listener in order, stopping at the first failure.
    pub async fn publish(&self, event: &OutageEvent) -> Result<(), OutageError> {
        for listener in self.listeners.iter() {
            debug!(
                target: "outage_router::listener",
                event_id = %event.event_id(),
                listener = listener.name(),
                "notifying listener"
            );
            if let Err(source) = listener.on_event(event).await {
                error!(
                    target: "outage_router::listener",
                    event_id = %event.event_id(),
                    listener = listener.name(),
                    error = %source,
                    "error while notifying listener"
                );
                return Err(OutageError::Publish {
                    event_id: event.event_id().to_string(),
                    listener: listener.name().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }
}

/// Build phase for [`ListenerRegistry`]. Listeners are only ever appended.
#[derive(Default)]
pub struct ListenerRegistryBuilder {
    listeners: Vec<Arc<dyn OutageEventListener>>,
}

impl ListenerRegistryBuilder {
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: OutageEventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Append an already shared listener.
    pub fn shared(mut self, listener: Arc<dyn OutageEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> ListenerRegistry {
        info!(
            target: "outage_router::listener",
            count = self.listeners.len(),
            "registered outage event listeners"
        );
        ListenerRegistry { listeners: Arc::new(self.listeners) }
    }
}

/// Logs every event it receives.
#[derive(Clone, Debug, Default)]
pub struct StandardOutageListener;

#[async_trait]
impl OutageEventListener for StandardOutageListener {
    async fn on_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        info!(
            target: "outage_router::listener",
            event_id = %event.event_id(),
            source = %event.source_system(),
            severity = event.severity(),
            priority = ?event.priority(),
            "outage event received"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Escalates critical events; ignores the rest.
#[derive(Clone, Debug, Default)]
pub struct CriticalOutageListener;

#[async_trait]
impl OutageEventListener for CriticalOutageListener {
    async fn on_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        if event.is_critical() {
            warn!(
                target: "outage_router::listener",
                event_id = %event.event_id(),
                source = %event.source_system(),
                priority = ?event.priority(),
                "critical outage requires immediate attention"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "critical"
    }
}
