//! Domain services composed from the repository ports
//!
//! Services own validation, authorization and audit-logging. Handlers only
//! translate between HTTP and these calls.

use chrono::NaiveDate;
use common::{error::DatabaseError, pay_period::PayPeriodError};
use thiserror::Error;

use crate::models::{Principal, Role};

pub mod audit;
pub mod broadcast;
pub mod devices;
pub mod payroll;
pub mod punches;

pub use audit::{Actor, AuditEntry, AuditRecorder, AuditTarget, RawAuditEntry, RequestMeta};
pub use broadcast::PunchBroadcaster;
pub use devices::{DeviceGate, DeviceTrustError};
pub use payroll::{GenerationWindow, PayrollService};
pub use punches::PunchService;

/// Errors raised by the domain services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input; the message names the field
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    Device(#[from] DeviceTrustError),

    /// The date falls inside an approved or locked payroll period
    #[error("Payroll period is locked for {0}")]
    PeriodLocked(NaiveDate),

    /// The mutation succeeded but its audit record could not be written
    #[error("Audit log write failed: {0}")]
    Audit(#[source] DatabaseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Pay period configuration error: {0}")]
    PayPeriod(#[from] PayPeriodError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fail with [`ServiceError::Forbidden`] unless the principal holds one of `allowed`.
pub fn require_roles(principal: &Principal, allowed: &[Role]) -> ServiceResult<()> {
    if principal.has_role(allowed) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// Reject an absent value, naming the field. Blank text is left to the
/// field's own parser.
pub(crate) fn required<T>(value: Option<T>, field: &str) -> ServiceResult<T> {
    value.ok_or_else(|| ServiceError::Validation(format!("{} is required", field)))
}
