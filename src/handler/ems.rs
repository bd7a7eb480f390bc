//! EMS (energy management) events.

use crate::error::OutageError;
use crate::event::{OutageEvent, SourceSystem};
use crate::handler::{
    normalize_common, validate_structure, weighted_priority, Collaborators, OutageHandleTemplate,
};

const DEFAULT_DESCRIPTION: &str = "EMS grid disturbance";

/// Severity at or above which EMS events are always treated as critical.
pub const EMS_CRITICAL_SEVERITY: i32 = 8;

/// Handler for events raised by the energy management system.
///
/// Normalization escalates high-severity events to critical. Priority: `severity * 8`,
/// plus 30 when critical.
#[derive(Debug, Clone)]
pub struct EmsHandler {
    collaborators: Collaborators,
}

impl EmsHandler {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

impl OutageHandleTemplate for EmsHandler {
    fn source_system(&self) -> SourceSystem {
        SourceSystem::Ems
    }

    fn name(&self) -> &str {
        "EmsHandler"
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn validate(&self, event: &OutageEvent) -> Result<(), OutageError> {
        validate_structure(SourceSystem::Ems, event)
    }

    fn normalize(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        normalize_common(event, DEFAULT_DESCRIPTION);
        if event.severity() >= EMS_CRITICAL_SEVERITY {
            event.set_critical(true);
        }
        Ok(())
    }

    fn calculate_priority(&self, event: &OutageEvent) -> Result<u8, OutageError> {
        Ok(weighted_priority(event, 8, 30))
    }
}
