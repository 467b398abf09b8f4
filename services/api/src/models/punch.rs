//! Punch models and request payloads

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::iso_timestamp;

/// Direction of a punch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PunchType {
    In,
    Out,
}

impl PunchType {
    pub fn as_str(self) -> &'static str {
        match self {
            PunchType::In => "IN",
            PunchType::Out => "OUT",
        }
    }
}

impl fmt::Display for PunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PunchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(PunchType::In),
            "OUT" => Ok(PunchType::Out),
            other => Err(format!("type must be IN or OUT, got {}", other)),
        }
    }
}

/// Punch record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Punch {
    pub id: i64,
    pub organization_id: i64,
    pub employee_id: i64,
    pub location_id: i64,
    #[serde(rename = "type")]
    pub punch_type: PunchType,
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
    pub is_override: bool,
    pub overridden_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a punch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPunch {
    pub organization_id: i64,
    pub employee_id: i64,
    pub location_id: i64,
    pub punch_type: PunchType,
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
    pub is_override: bool,
    pub overridden_by: Option<i64>,
}

/// Supervisor override of an existing punch. Always marks the punch as overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchChanges {
    pub punch_type: Option<PunchType>,
    pub timestamp: Option<DateTime<Utc>>,
    pub overridden_by: i64,
}

/// Kiosk punch request (`POST /punches/add`)
///
/// Fields stay optional so that a missing one is reported by name instead of
/// as a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePunchRequest {
    pub employee_id: Option<i64>,
    pub location_id: Option<i64>,
    #[serde(rename = "type")]
    pub punch_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Supervisor edit request (`PUT /supervisor/punch/:id`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorEditRequest {
    pub reason: Option<String>,
    #[serde(rename = "type")]
    pub punch_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub supervisor_id: Option<i64>,
}

/// Supervisor delete request (`DELETE /supervisor/punch/:id`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorDeleteRequest {
    pub reason: Option<String>,
    pub supervisor_id: Option<i64>,
}

/// Supervisor shift creation (`POST /supervisor/shift`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorShiftRequest {
    pub employee_id: Option<i64>,
    pub location_id: Option<i64>,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub supervisor_id: Option<i64>,
}

/// Real-time notification published after a kiosk punch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchEvent {
    pub punch_id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    #[serde(rename = "type")]
    pub punch_type: PunchType,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip)]
    pub organization_id: i64,
}

impl PunchEvent {
    pub fn new(punch: &Punch, employee_name: &str, location_name: Option<&str>) -> Self {
        Self {
            punch_id: punch.id,
            employee_id: punch.employee_id,
            employee_name: employee_name.to_string(),
            punch_type: punch.punch_type,
            timestamp: iso_timestamp(&punch.timestamp),
            location_name: location_name.map(str::to_string),
            organization_id: punch.organization_id,
        }
    }
}
