//! Audit log models

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical audit action codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreatePunch,
    DeletePunch,
    SupervisorEditPunch,
    SupervisorDeletePunch,
    SupervisorCreateShift,
    DeviceRegistered,
    DeviceApproved,
    DeviceDeactivated,
    PayrollPeriodApproved,
    PayrollPeriodLocked,
    PayrollPeriodsGenerated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::CreatePunch => "CREATE_PUNCH",
            AuditAction::DeletePunch => "DELETE_PUNCH",
            AuditAction::SupervisorEditPunch => "SUPERVISOR_EDIT_PUNCH",
            AuditAction::SupervisorDeletePunch => "SUPERVISOR_DELETE_PUNCH",
            AuditAction::SupervisorCreateShift => "SUPERVISOR_CREATE_SHIFT",
            AuditAction::DeviceRegistered => "DEVICE_REGISTERED",
            AuditAction::DeviceApproved => "DEVICE_APPROVED",
            AuditAction::DeviceDeactivated => "DEVICE_DEACTIVATED",
            AuditAction::PayrollPeriodApproved => "PAYROLL_PERIOD_APPROVED",
            AuditAction::PayrollPeriodLocked => "PAYROLL_PERIOD_LOCKED",
            AuditAction::PayrollPeriodsGenerated => "PAYROLL_PERIODS_GENERATED",
        }
    }

    /// Entity type assumed when an entry does not name one.
    pub fn entity_type(self) -> &'static str {
        match self {
            AuditAction::CreatePunch
            | AuditAction::DeletePunch
            | AuditAction::SupervisorEditPunch
            | AuditAction::SupervisorDeletePunch
            | AuditAction::SupervisorCreateShift => "Punch",
            AuditAction::DeviceRegistered
            | AuditAction::DeviceApproved
            | AuditAction::DeviceDeactivated => "Device",
            AuditAction::PayrollPeriodApproved
            | AuditAction::PayrollPeriodLocked
            | AuditAction::PayrollPeriodsGenerated => "PayrollPeriod",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| format!("unknown audit action: {}", s))
    }
}

/// Audit log row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i64,
    pub action: AuditAction,
    pub organization_id: Option<i64>,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub method: Option<String>,
    pub path: Option<String>,
    pub ip: Option<String>,
    /// `None` when the entry carried no detail; never an empty object.
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Normalized audit row, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLog {
    pub action: AuditAction,
    pub organization_id: Option<i64>,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub method: Option<String>,
    pub path: Option<String>,
    pub ip: Option<String>,
    pub metadata: Option<Value>,
}

/// Filters for `GET /audit-logs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub action: Option<AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub limit: Option<u32>,
}
