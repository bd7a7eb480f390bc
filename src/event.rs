//! Outage event model.
//!
//! An [`OutageEvent`] describes one outage occurrence reported by an upstream source system.
//! The identifier and source system are fixed at construction; only the handler's normalize
//! and prioritize stages may change the remaining fields.
//!
//! Wire format (ingestion boundary):
//!
//! ```json
//! {
//!   "eventId": "42",
//!   "eventDescription": "feeder trip",
//!   "sourceSystem": "scada",
//!   "eventTime": "2025-10-06 14:38:00",
//!   "stormLevel": 5,
//!   "critical": false
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Lowest severity after normalization.
pub const MIN_SEVERITY: i32 = 0;
/// Highest severity after normalization.
pub const MAX_SEVERITY: i32 = 10;

/// Upstream system that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceSystem {
    Scada,
    Ems,
    Dms,
}

impl SourceSystem {
    /// Declared set of supported source systems.
    pub const ALL: [SourceSystem; 3] = [SourceSystem::Scada, SourceSystem::Ems, SourceSystem::Dms];

    /// Canonical upper-case tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::Scada => "SCADA",
            SourceSystem::Ems => "EMS",
            SourceSystem::Dms => "DMS",
        }
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCADA" => Ok(SourceSystem::Scada),
            "EMS" => Ok(SourceSystem::Ems),
            "DMS" => Ok(SourceSystem::Dms),
            _ => Err(ConfigError::UnknownSourceSystem { tag: s.to_string() }),
        }
    }
}

impl Serialize for SourceSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceSystem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One outage occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageEvent {
    event_id: String,
    #[serde(rename = "eventDescription", default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    source_system: SourceSystem,
    #[serde(with = "wire_time")]
    event_time: DateTime<Utc>,
    #[serde(rename = "stormLevel", default)]
    severity: i32,
    #[serde(default)]
    critical: bool,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
}

impl OutageEvent {
    /// Create an event with the required fields; optional fields take their defaults.
    pub fn new(
        event_id: impl Into<String>,
        source_system: SourceSystem,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            description: None,
            source_system,
            event_time,
            severity: MIN_SEVERITY,
            critical: false,
            priority: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_severity(mut self, severity: i32) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn source_system(&self) -> SourceSystem {
        self.source_system
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn severity(&self) -> i32 {
        self.severity
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Priority score assigned by the CalculatePriority stage, if it has run.
    pub fn priority(&self) -> Option<u8> {
        self.priority
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn set_severity(&mut self, severity: i32) {
        self.severity = severity;
    }

    pub fn set_critical(&mut self, critical: bool) {
        self.critical = critical;
    }

    pub(crate) fn set_priority(&mut self, priority: u8) {
        self.priority = Some(priority);
    }

    /// Clamp severity into `MIN_SEVERITY..=MAX_SEVERITY`. Idempotent.
    pub fn clamp_severity(&mut self) {
        self.severity = self.severity.clamp(MIN_SEVERITY, MAX_SEVERITY);
    }
}

/// `yyyy-MM-dd HH:mm:ss` in UTC.
mod wire_time {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let naive =
            NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}
