//! In-process implementation of every repository port
//!
//! Backs the HTTP tests and local runs without PostgreSQL. Constraint
//! behavior mirrors the migrations: `(location_id, start_date)` is unique for
//! payroll periods and audit logs are append-only.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::error::{DatabaseError, DatabaseResult};
use tokio::sync::Mutex;

use super::{
    AuditLogRepository, DeviceRepository, DirectoryRepository, PayrollPeriodRepository,
    PunchRepository,
};
use crate::models::{
    AuditLog, AuditLogQuery, Device, Employee, Location, NewAuditLog, NewPayrollPeriod, NewPunch,
    PayrollPeriod, PeriodStatus, Punch, PunchChanges,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    employees: BTreeMap<i64, Employee>,
    locations: BTreeMap<i64, Location>,
    devices: BTreeMap<i64, Device>,
    punches: BTreeMap<i64, Punch>,
    periods: BTreeMap<i64, PayrollPeriod>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_employee(&self, organization_id: i64, name: &str) -> Employee {
        let mut tables = self.tables.lock().await;
        let employee = Employee {
            id: tables.next_id(),
            organization_id,
            name: name.to_string(),
        };
        tables.employees.insert(employee.id, employee.clone());
        employee
    }

    /// Add a location with an explicit cadence configuration.
    pub async fn add_location(
        &self,
        organization_id: i64,
        name: &str,
        pay_cadence: &str,
        week_start_day: Option<i32>,
        biweekly_anchor_date: Option<NaiveDate>,
    ) -> Location {
        let mut tables = self.tables.lock().await;
        let location = Location {
            id: tables.next_id(),
            organization_id,
            name: name.to_string(),
            pay_cadence: pay_cadence.to_string(),
            week_start_day,
            biweekly_anchor_date,
        };
        tables.locations.insert(location.id, location.clone());
        location
    }

    pub async fn add_device(
        &self,
        device_id: &str,
        location_id: i64,
        is_approved: bool,
        is_active: bool,
    ) -> Device {
        let mut tables = self.tables.lock().await;
        let device = Device {
            id: tables.next_id(),
            device_id: device_id.to_string(),
            location_id,
            name: None,
            is_approved,
            is_active,
            last_seen_at: None,
            created_at: Utc::now(),
        };
        tables.devices.insert(device.id, device.clone());
        device
    }

    /// Insert a period directly in the given status, bypassing the lifecycle.
    pub async fn add_period(
        &self,
        organization_id: i64,
        location_id: Option<i64>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        status: PeriodStatus,
    ) -> PayrollPeriod {
        let mut tables = self.tables.lock().await;
        let period = PayrollPeriod {
            id: tables.next_id(),
            organization_id,
            location_id,
            start_date,
            end_date,
            status,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
        };
        tables.periods.insert(period.id, period.clone());
        period
    }

    pub async fn add_punch(&self, punch: &NewPunch) -> Punch {
        let mut tables = self.tables.lock().await;
        insert_punch(&mut tables, punch)
    }

    pub async fn punches(&self) -> Vec<Punch> {
        self.tables.lock().await.punches.values().cloned().collect()
    }

    pub async fn periods(&self) -> Vec<PayrollPeriod> {
        self.tables.lock().await.periods.values().cloned().collect()
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.tables.lock().await.devices.values().cloned().collect()
    }

    /// Audit rows in insertion order.
    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.tables.lock().await.audit_logs.clone()
    }

    /// Make subsequent audit inserts fail, to exercise error paths.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }
}

fn insert_punch(tables: &mut Tables, punch: &NewPunch) -> Punch {
    let now = Utc::now();
    let stored = Punch {
        id: tables.next_id(),
        organization_id: punch.organization_id,
        employee_id: punch.employee_id,
        location_id: punch.location_id,
        punch_type: punch.punch_type,
        timestamp: punch.timestamp,
        device_id: punch.device_id.clone(),
        is_override: punch.is_override,
        overridden_by: punch.overridden_by,
        created_at: now,
        updated_at: now,
    };
    tables.punches.insert(stored.id, stored.clone());
    stored
}

#[async_trait]
impl PunchRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Punch>> {
        Ok(self.tables.lock().await.punches.get(&id).cloned())
    }

    async fn create(&self, punch: &NewPunch) -> DatabaseResult<Punch> {
        let mut tables = self.tables.lock().await;
        Ok(insert_punch(&mut tables, punch))
    }

    async fn update(&self, id: i64, changes: &PunchChanges) -> DatabaseResult<Option<Punch>> {
        let mut tables = self.tables.lock().await;
        let Some(punch) = tables.punches.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(punch_type) = changes.punch_type {
            punch.punch_type = punch_type;
        }
        if let Some(timestamp) = changes.timestamp {
            punch.timestamp = timestamp;
        }
        punch.is_override = true;
        punch.overridden_by = Some(changes.overridden_by);
        punch.updated_at = Utc::now();

        Ok(Some(punch.clone()))
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        Ok(self.tables.lock().await.punches.remove(&id).is_some())
    }
}

#[async_trait]
impl DeviceRepository for MemoryStore {
    async fn find_by_device_id(&self, device_id: &str) -> DatabaseResult<Option<Device>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .devices
            .values()
            .find(|device| device.device_id == device_id)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Device>> {
        Ok(self.tables.lock().await.devices.get(&id).cloned())
    }

    async fn register(
        &self,
        device_id: &str,
        location_id: i64,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<Device>> {
        let mut tables = self.tables.lock().await;
        if tables.devices.values().any(|d| d.device_id == device_id) {
            return Ok(None);
        }

        let device = Device {
            id: tables.next_id(),
            device_id: device_id.to_string(),
            location_id,
            name: None,
            is_approved: false,
            is_active: true,
            last_seen_at: Some(seen_at),
            created_at: seen_at,
        };
        tables.devices.insert(device.id, device.clone());
        Ok(Some(device))
    }

    async fn touch(
        &self,
        id: i64,
        location_id: Option<i64>,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Device> {
        let mut tables = self.tables.lock().await;
        let device = tables
            .devices
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::Configuration(format!("device {} not found", id)))?;

        if let Some(location_id) = location_id {
            device.location_id = location_id;
        }
        device.last_seen_at = Some(seen_at);
        Ok(device.clone())
    }

    async fn set_approved(&self, id: i64, approved: bool) -> DatabaseResult<Option<Device>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.devices.get_mut(&id).map(|device| {
            device.is_approved = approved;
            device.clone()
        }))
    }

    async fn set_active(&self, id: i64, active: bool) -> DatabaseResult<Option<Device>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.devices.get_mut(&id).map(|device| {
            device.is_active = active;
            device.clone()
        }))
    }
}

#[async_trait]
impl PayrollPeriodRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>> {
        Ok(self.tables.lock().await.periods.get(&id).cloned())
    }

    async fn insert_if_absent(&self, period: &NewPayrollPeriod) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        // NULL locations never collide, same as the unique index
        let exists = period.location_id.is_some()
            && tables.periods.values().any(|existing| {
                existing.location_id == period.location_id
                    && existing.start_date == period.start_date
            });
        if exists {
            return Ok(false);
        }

        let stored = PayrollPeriod {
            id: tables.next_id(),
            organization_id: period.organization_id,
            location_id: period.location_id,
            start_date: period.start_date,
            end_date: period.end_date,
            status: PeriodStatus::Open,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
        };
        tables.periods.insert(stored.id, stored);
        Ok(true)
    }

    async fn approve(
        &self,
        id: i64,
        approver_id: i64,
        approved_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<PayrollPeriod>> {
        let mut tables = self.tables.lock().await;
        match tables.periods.get_mut(&id) {
            Some(period) if period.status == PeriodStatus::Open => {
                period.status = PeriodStatus::Approved;
                period.approved_by = Some(approver_id);
                period.approved_at = Some(approved_at);
                Ok(Some(period.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn lock(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>> {
        let mut tables = self.tables.lock().await;
        match tables.periods.get_mut(&id) {
            Some(period) if period.status == PeriodStatus::Approved => {
                period.status = PeriodStatus::Locked;
                Ok(Some(period.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn is_frozen(
        &self,
        organization_id: i64,
        location_id: Option<i64>,
        date: NaiveDate,
    ) -> DatabaseResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.periods.values().any(|period| {
            period.organization_id == organization_id
                && (period.location_id.is_none() || period.location_id == location_id)
                && period.contains(date)
                && period.status.freezes_punches()
        }))
    }
}

#[async_trait]
impl AuditLogRepository for MemoryStore {
    async fn insert(&self, entry: &NewAuditLog) -> DatabaseResult<AuditLog> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Configuration(
                "audit log writes are disabled".to_string(),
            ));
        }

        let mut tables = self.tables.lock().await;
        let log = AuditLog {
            id: tables.next_id(),
            action: entry.action,
            organization_id: entry.organization_id,
            user_id: entry.user_id,
            user_email: entry.user_email.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            method: entry.method.clone(),
            path: entry.path.clone(),
            ip: entry.ip.clone(),
            metadata: entry.metadata.clone(),
            created_at: Utc::now(),
        };
        tables.audit_logs.push(log.clone());
        Ok(log)
    }

    async fn list(
        &self,
        organization_id: i64,
        query: &AuditLogQuery,
    ) -> DatabaseResult<Vec<AuditLog>> {
        let limit = query.limit.unwrap_or(100).clamp(1, 500) as usize;
        let tables = self.tables.lock().await;

        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .filter(|log| log.organization_id == Some(organization_id))
            .filter(|log| query.action.is_none_or(|action| log.action == action))
            .filter(|log| {
                query
                    .entity_type
                    .as_ref()
                    .is_none_or(|entity_type| &log.entity_type == entity_type)
            })
            .filter(|log| {
                query
                    .entity_id
                    .as_ref()
                    .is_none_or(|entity_id| &log.entity_id == entity_id)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn find_employee(&self, id: i64) -> DatabaseResult<Option<Employee>> {
        Ok(self.tables.lock().await.employees.get(&id).cloned())
    }

    async fn find_location(&self, id: i64) -> DatabaseResult<Option<Location>> {
        Ok(self.tables.lock().await.locations.get(&id).cloned())
    }

    async fn list_locations(&self) -> DatabaseResult<Vec<Location>> {
        Ok(self.tables.lock().await.locations.values().cloned().collect())
    }
}
