//! Domain models and request/response payloads

use chrono::{DateTime, Utc};

pub mod audit_log;
pub mod device;
pub mod directory;
pub mod payroll_period;
pub mod principal;
pub mod punch;

pub use audit_log::{AuditAction, AuditLog, AuditLogQuery, NewAuditLog};
pub use device::{Device, DeviceContext};
pub use directory::{Employee, Location};
pub use payroll_period::{
    GenerateQuery, GenerateResponse, LockedQuery, NewPayrollPeriod, PayrollPeriod, PeriodQuery,
    PeriodStatus,
};
pub use principal::{ADMIN_ROLES, Principal, Role, SUPERVISOR_ROLES};
pub use punch::{
    CreatePunchRequest, NewPunch, Punch, PunchChanges, PunchEvent, PunchType,
    SupervisorDeleteRequest, SupervisorEditRequest, SupervisorShiftRequest,
};

/// Render an instant the way JavaScript clients expect: UTC, millisecond precision.
pub fn iso_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
