//! SCADA feeder alarms.

use crate::error::OutageError;
use crate::event::{OutageEvent, SourceSystem};
use crate::handler::{
    normalize_common, validate_structure, weighted_priority, Collaborators, OutageHandleTemplate,
};

const DEFAULT_DESCRIPTION: &str = "SCADA outage alarm";

/// Handler for events raised by the SCADA telemetry system.
///
/// Priority: `severity * 10`, plus 50 when critical.
#[derive(Debug, Clone)]
pub struct ScadaHandler {
    collaborators: Collaborators,
}

impl ScadaHandler {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

impl OutageHandleTemplate for ScadaHandler {
    fn source_system(&self) -> SourceSystem {
        SourceSystem::Scada
    }

    fn name(&self) -> &str {
        "ScadaHandler"
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn validate(&self, event: &OutageEvent) -> Result<(), OutageError> {
        validate_structure(SourceSystem::Scada, event)
    }

    fn normalize(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        normalize_common(event, DEFAULT_DESCRIPTION);
        Ok(())
    }

    fn calculate_priority(&self, event: &OutageEvent) -> Result<u8, OutageError> {
        Ok(weighted_priority(event, 10, 50))
    }
}
