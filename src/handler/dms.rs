//! DMS (distribution management) events.

use chrono::{Duration, Utc};

use crate::error::OutageError;
use crate::event::{OutageEvent, SourceSystem};
use crate::handler::{
    normalize_common, validate_structure, weighted_priority, Collaborators, OutageHandleTemplate,
    Stage,
};

const DEFAULT_DESCRIPTION: &str = "DMS distribution outage";

/// How far ahead of the local clock an event timestamp may be.
pub const DMS_MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Handler for events raised by the distribution management system.
///
/// Validation rejects timestamps too far in the future. Priority: `severity * 10`, plus 40
/// when critical.
#[derive(Debug, Clone)]
pub struct DmsHandler {
    collaborators: Collaborators,
}

impl DmsHandler {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

impl OutageHandleTemplate for DmsHandler {
    fn source_system(&self) -> SourceSystem {
        SourceSystem::Dms
    }

    fn name(&self) -> &str {
        "DmsHandler"
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn validate(&self, event: &OutageEvent) -> Result<(), OutageError> {
        validate_structure(SourceSystem::Dms, event)?;
        let limit = Utc::now() + Duration::seconds(DMS_MAX_CLOCK_SKEW_SECS);
        if event.event_time() > limit {
            return Err(OutageError::processing(
                event.event_id(),
                Stage::Validate,
                format!("event time {} is in the future", event.event_time()),
            ));
        }
        Ok(())
    }

    fn normalize(&self, event: &mut OutageEvent) -> Result<(), OutageError> {
        normalize_common(event, DEFAULT_DESCRIPTION);
        Ok(())
    }

    fn calculate_priority(&self, event: &OutageEvent) -> Result<u8, OutageError> {
        Ok(weighted_priority(event, 10, 40))
    }
}
