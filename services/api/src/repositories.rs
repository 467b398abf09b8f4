//! Persistence ports and their PostgreSQL implementations
//!
//! Every service receives its repositories as `Arc<dyn Trait>`, built once at
//! startup from a single pool. [`memory::MemoryStore`] implements the same
//! ports in process for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::error::DatabaseResult;

use crate::models::{
    AuditLog, AuditLogQuery, Device, Employee, Location, NewAuditLog, NewPayrollPeriod, NewPunch,
    PayrollPeriod, Punch, PunchChanges,
};

pub mod audit_log;
pub mod device;
pub mod directory;
pub mod memory;
pub mod payroll_period;
pub mod punch;

pub use audit_log::PgAuditLogRepository;
pub use device::PgDeviceRepository;
pub use directory::PgDirectoryRepository;
pub use payroll_period::PgPayrollPeriodRepository;
pub use punch::PgPunchRepository;

/// Punch storage
#[async_trait]
pub trait PunchRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Punch>>;

    async fn create(&self, punch: &NewPunch) -> DatabaseResult<Punch>;

    /// Apply a supervisor override. Returns `None` when the punch no longer exists.
    async fn update(&self, id: i64, changes: &PunchChanges) -> DatabaseResult<Option<Punch>>;

    /// Returns `true` if a row was deleted.
    async fn delete(&self, id: i64) -> DatabaseResult<bool>;
}

/// Kiosk device registry
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn find_by_device_id(&self, device_id: &str) -> DatabaseResult<Option<Device>>;

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Device>>;

    /// Create an unapproved, active device with its first heartbeat.
    /// `None` when the device id is already taken.
    async fn register(
        &self,
        device_id: &str,
        location_id: i64,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<Device>>;

    /// Record a heartbeat, moving the device to `location_id` when given.
    async fn touch(
        &self,
        id: i64,
        location_id: Option<i64>,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Device>;

    async fn set_approved(&self, id: i64, approved: bool) -> DatabaseResult<Option<Device>>;

    async fn set_active(&self, id: i64, active: bool) -> DatabaseResult<Option<Device>>;
}

/// Payroll period storage
#[async_trait]
pub trait PayrollPeriodRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>>;

    /// Insert a period. Returns `false` when `(location, start)` already exists.
    async fn insert_if_absent(&self, period: &NewPayrollPeriod) -> DatabaseResult<bool>;

    /// OPEN -> APPROVED. Returns `None` if the period is missing or not open.
    async fn approve(
        &self,
        id: i64,
        approver_id: i64,
        approved_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<PayrollPeriod>>;

    /// APPROVED -> LOCKED. Returns `None` if the period is missing or not approved.
    async fn lock(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>>;

    /// Whether an APPROVED or LOCKED period of the organization covers `date`,
    /// either org-wide or for `location_id`.
    async fn is_frozen(
        &self,
        organization_id: i64,
        location_id: Option<i64>,
        date: NaiveDate,
    ) -> DatabaseResult<bool>;
}

/// Audit log storage. Append-only.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, entry: &NewAuditLog) -> DatabaseResult<AuditLog>;

    async fn list(
        &self,
        organization_id: i64,
        query: &AuditLogQuery,
    ) -> DatabaseResult<Vec<AuditLog>>;
}

/// Read access to employees and locations
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn find_employee(&self, id: i64) -> DatabaseResult<Option<Employee>>;

    async fn find_location(&self, id: i64) -> DatabaseResult<Option<Location>>;

    async fn list_locations(&self) -> DatabaseResult<Vec<Location>>;
}
