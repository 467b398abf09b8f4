//! Punch and supervisor override workflow
//!
//! Each mutation follows the same sequence: validate, load the current
//! record, refuse dates inside a frozen payroll period, mutate, audit. The
//! audit write happens after the mutation has committed; if it fails the
//! request fails but the mutation stays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use super::{
    Actor, AuditEntry, AuditRecorder, AuditTarget, PayrollService, PunchBroadcaster, RequestMeta,
    ServiceError, ServiceResult, audit::snapshot, require_roles, required,
};
use crate::{
    models::{
        ADMIN_ROLES, AuditAction, CreatePunchRequest, DeviceContext, Employee, Location, NewPunch,
        Principal, Punch, PunchChanges, PunchEvent, PunchType, SUPERVISOR_ROLES,
        SupervisorDeleteRequest, SupervisorEditRequest, SupervisorShiftRequest,
    },
    repositories::{DirectoryRepository, PunchRepository},
    validation::validate_reason,
};

#[derive(Clone)]
pub struct PunchService {
    punches: Arc<dyn PunchRepository>,
    directory: Arc<dyn DirectoryRepository>,
    payroll: PayrollService,
    audit: AuditRecorder,
    broadcaster: PunchBroadcaster,
}

impl PunchService {
    pub fn new(
        punches: Arc<dyn PunchRepository>,
        directory: Arc<dyn DirectoryRepository>,
        payroll: PayrollService,
        audit: AuditRecorder,
        broadcaster: PunchBroadcaster,
    ) -> Self {
        Self {
            punches,
            directory,
            payroll,
            audit,
            broadcaster,
        }
    }

    /// Kiosk punch from an admitted device. The location defaults to the
    /// device's own and the timestamp to `now`.
    pub async fn create(
        &self,
        device: &DeviceContext,
        request: CreatePunchRequest,
        now: DateTime<Utc>,
        meta: RequestMeta,
    ) -> ServiceResult<Punch> {
        let employee_id = required(request.employee_id, "employeeId")?;
        let punch_type = parse_type(required(request.punch_type, "type")?)?;
        let location_id = request.location_id.unwrap_or(device.location_id);
        let timestamp = request.timestamp.unwrap_or(now);

        let (employee, location) = self.resolve(employee_id, location_id, None).await?;
        self.payroll
            .ensure_unlocked(location.organization_id, location.id, timestamp.date_naive())
            .await?;

        let punch = self
            .punches
            .create(&NewPunch {
                organization_id: location.organization_id,
                employee_id: employee.id,
                location_id: location.id,
                punch_type,
                timestamp,
                device_id: Some(device.device_id.clone()),
                is_override: false,
                overridden_by: None,
            })
            .await?;
        info!(
            punch_id = punch.id,
            employee_id = employee.id,
            device_id = %device.device_id,
            "Punch recorded"
        );

        self.audit
            .record(
                AuditEntry::new(AuditAction::CreatePunch, AuditTarget::entity("Punch", punch.id))
                    .organization(punch.organization_id)
                    .request(meta)
                    .after(snapshot(&punch))
                    .meta("deviceId", device.device_id.clone()),
            )
            .await?;

        self.broadcaster
            .publish(PunchEvent::new(&punch, &employee.name, Some(&location.name)));
        Ok(punch)
    }

    /// Administrative hard delete.
    pub async fn delete(
        &self,
        principal: &Principal,
        id: i64,
        meta: RequestMeta,
    ) -> ServiceResult<Punch> {
        require_roles(principal, ADMIN_ROLES)?;
        let before = self.remove(principal, id).await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::DeletePunch, AuditTarget::entity("Punch", id))
                    .organization(principal.organization_id)
                    .actor(Actor::from(principal))
                    .request(meta)
                    .before(snapshot(&before)),
            )
            .await?;
        Ok(before)
    }

    pub async fn supervisor_edit(
        &self,
        principal: &Principal,
        id: i64,
        request: SupervisorEditRequest,
        meta: RequestMeta,
    ) -> ServiceResult<Punch> {
        require_roles(principal, SUPERVISOR_ROLES)?;
        let reason = validate_reason(request.reason.as_deref()).map_err(ServiceError::Validation)?;
        let punch_type = request.punch_type.map(parse_type).transpose()?;

        let before = self.find_in_organization(principal, id).await?;
        self.payroll
            .ensure_unlocked(
                before.organization_id,
                before.location_id,
                before.timestamp.date_naive(),
            )
            .await?;
        if let Some(timestamp) = request.timestamp {
            self.payroll
                .ensure_unlocked(before.organization_id, before.location_id, timestamp.date_naive())
                .await?;
        }

        let changes = PunchChanges {
            punch_type,
            timestamp: request.timestamp,
            overridden_by: request.supervisor_id.unwrap_or(principal.user_id),
        };
        let punch = self
            .punches
            .update(id, &changes)
            .await?
            .ok_or(ServiceError::NotFound("Punch"))?;
        info!(
            punch_id = id,
            overridden_by = changes.overridden_by,
            "Punch overridden by supervisor"
        );

        self.audit
            .record(
                AuditEntry::new(AuditAction::SupervisorEditPunch, AuditTarget::entity("Punch", id))
                    .organization(principal.organization_id)
                    .actor(Actor::from(principal))
                    .request(meta)
                    .before(snapshot(&before))
                    .after(snapshot(&punch))
                    .reason(reason),
            )
            .await?;
        Ok(punch)
    }

    pub async fn supervisor_delete(
        &self,
        principal: &Principal,
        id: i64,
        request: SupervisorDeleteRequest,
        meta: RequestMeta,
    ) -> ServiceResult<Punch> {
        require_roles(principal, SUPERVISOR_ROLES)?;
        let reason = validate_reason(request.reason.as_deref()).map_err(ServiceError::Validation)?;
        let before = self.remove(principal, id).await?;

        let mut entry =
            AuditEntry::new(AuditAction::SupervisorDeletePunch, AuditTarget::entity("Punch", id))
                .organization(principal.organization_id)
                .actor(Actor::from(principal))
                .request(meta)
                .before(snapshot(&before))
                .reason(reason);
        if let Some(supervisor_id) = request.supervisor_id {
            entry = entry.meta("supervisorId", supervisor_id);
        }
        self.audit.record(entry).await?;
        Ok(before)
    }

    /// Create a full IN/OUT pair on behalf of an employee.
    pub async fn create_shift(
        &self,
        principal: &Principal,
        request: SupervisorShiftRequest,
        meta: RequestMeta,
    ) -> ServiceResult<Vec<Punch>> {
        require_roles(principal, SUPERVISOR_ROLES)?;
        let employee_id = required(request.employee_id, "employeeId")?;
        let location_id = required(request.location_id, "locationId")?;
        let clock_in = required(request.clock_in, "clockIn")?;
        let clock_out = required(request.clock_out, "clockOut")?;
        let reason = validate_reason(request.reason.as_deref()).map_err(ServiceError::Validation)?;
        if clock_out <= clock_in {
            return Err(ServiceError::Validation(
                "clockOut must be after clockIn".to_string(),
            ));
        }

        let (employee, location) = self
            .resolve(employee_id, location_id, Some(principal.organization_id))
            .await?;
        for instant in [clock_in, clock_out] {
            self.payroll
                .ensure_unlocked(location.organization_id, location.id, instant.date_naive())
                .await?;
        }

        let overridden_by = request.supervisor_id.unwrap_or(principal.user_id);
        let mut punches = Vec::with_capacity(2);
        for (punch_type, timestamp) in [(PunchType::In, clock_in), (PunchType::Out, clock_out)] {
            let punch = self
                .punches
                .create(&NewPunch {
                    organization_id: location.organization_id,
                    employee_id: employee.id,
                    location_id: location.id,
                    punch_type,
                    timestamp,
                    device_id: None,
                    is_override: true,
                    overridden_by: Some(overridden_by),
                })
                .await?;
            punches.push(punch);
        }
        info!(
            employee_id = employee.id,
            overridden_by,
            "Shift created by supervisor"
        );

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::SupervisorCreateShift,
                    AuditTarget::entity("Punch", punches[0].id),
                )
                .organization(principal.organization_id)
                .actor(Actor::from(principal))
                .request(meta)
                .after(Value::Array(punches.iter().map(snapshot).collect()))
                .reason(reason),
            )
            .await?;
        Ok(punches)
    }

    async fn find_in_organization(&self, principal: &Principal, id: i64) -> ServiceResult<Punch> {
        self.punches
            .find_by_id(id)
            .await?
            .filter(|p| p.organization_id == principal.organization_id)
            .ok_or(ServiceError::NotFound("Punch"))
    }

    /// Load, lock-check and delete, returning the deleted record.
    async fn remove(&self, principal: &Principal, id: i64) -> ServiceResult<Punch> {
        let before = self.find_in_organization(principal, id).await?;
        self.payroll
            .ensure_unlocked(
                before.organization_id,
                before.location_id,
                before.timestamp.date_naive(),
            )
            .await?;

        if !self.punches.delete(id).await? {
            return Err(ServiceError::NotFound("Punch"));
        }
        info!(punch_id = id, deleted_by = principal.user_id, "Punch deleted");
        Ok(before)
    }

    /// Employee and location must exist and share an organization, which
    /// must be `organization_id` when given.
    async fn resolve(
        &self,
        employee_id: i64,
        location_id: i64,
        organization_id: Option<i64>,
    ) -> ServiceResult<(Employee, Location)> {
        let in_scope = |org: i64| organization_id.is_none_or(|expected| expected == org);

        let employee = self
            .directory
            .find_employee(employee_id)
            .await?
            .filter(|e| in_scope(e.organization_id))
            .ok_or(ServiceError::NotFound("Employee"))?;
        let location = self
            .directory
            .find_location(location_id)
            .await?
            .filter(|l| in_scope(l.organization_id))
            .ok_or(ServiceError::NotFound("Location"))?;

        if employee.organization_id != location.organization_id {
            return Err(ServiceError::Validation(
                "employeeId does not belong to the location's organization".to_string(),
            ));
        }
        Ok((employee, location))
    }
}

fn parse_type(raw: String) -> ServiceResult<PunchType> {
    raw.parse().map_err(ServiceError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{PeriodStatus, Role},
        repositories::memory::MemoryStore,
    };
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        punches: PunchService,
        broadcaster: PunchBroadcaster,
        device: DeviceContext,
        employee: Employee,
        location: Location,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let location = store.add_location(1, "Warehouse", "WEEKLY", Some(1), None).await;
        let employee = store.add_employee(1, "Ada Lovelace").await;
        let device = store.add_device("kiosk-1", location.id, true, true).await;

        let audit = AuditRecorder::new(store.clone());
        let payroll = PayrollService::new(store.clone(), store.clone(), audit.clone());
        let broadcaster = PunchBroadcaster::new();
        let punches = PunchService::new(
            store.clone(),
            store.clone(),
            payroll,
            audit,
            broadcaster.clone(),
        );

        Fixture {
            store,
            punches,
            broadcaster,
            device: DeviceContext::from(&device),
            employee,
            location,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn supervisor() -> Principal {
        Principal {
            user_id: 50,
            organization_id: 1,
            role: Role::Supervisor,
            email: "sup@example.com".to_string(),
        }
    }

    fn kiosk_request(employee_id: i64, day: u32) -> CreatePunchRequest {
        CreatePunchRequest {
            employee_id: Some(employee_id),
            location_id: None,
            punch_type: Some("IN".to_string()),
            timestamp: Some(at(day, 8)),
        }
    }

    async fn seed_punch(f: &Fixture, day: u32) -> Punch {
        f.store
            .add_punch(&NewPunch {
                organization_id: 1,
                employee_id: f.employee.id,
                location_id: f.location.id,
                punch_type: PunchType::In,
                timestamp: at(day, 8),
                device_id: None,
                is_override: false,
                overridden_by: None,
            })
            .await
    }

    async fn lock_week_of_march_10(f: &Fixture) {
        f.store
            .add_period(
                1,
                Some(f.location.id),
                NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
                PeriodStatus::Approved,
            )
            .await;
    }

    #[tokio::test]
    async fn test_kiosk_punch_is_audited_and_broadcast() {
        let f = fixture().await;
        let mut rx = f.broadcaster.subscribe();

        let punch = f
            .punches
            .create(&f.device, kiosk_request(f.employee.id, 10), Utc::now(), RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(punch.location_id, f.location.id);
        assert_eq!(punch.device_id.as_deref(), Some("kiosk-1"));

        let logs = f.store.audit_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::CreatePunch);
        assert_eq!(logs[0].user_id, None);
        assert_eq!(logs[0].metadata.as_ref().unwrap()["deviceId"], json!("kiosk-1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.punch_id, punch.id);
        assert_eq!(event.employee_name, "Ada Lovelace");
        assert_eq!(event.location_name.as_deref(), Some("Warehouse"));
    }

    #[tokio::test]
    async fn test_kiosk_punch_validation() {
        let f = fixture().await;

        let mut missing = kiosk_request(f.employee.id, 10);
        missing.employee_id = None;
        let err = f
            .punches
            .create(&f.device, missing, Utc::now(), RequestMeta::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "employeeId is required");

        let mut bad_type = kiosk_request(f.employee.id, 10);
        bad_type.punch_type = Some("LUNCH".to_string());
        assert!(matches!(
            f.punches
                .create(&f.device, bad_type, Utc::now(), RequestMeta::default())
                .await,
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            f.punches
                .create(&f.device, kiosk_request(999, 10), Utc::now(), RequestMeta::default())
                .await,
            Err(ServiceError::NotFound("Employee"))
        ));
        assert!(f.store.punches().await.is_empty());
    }

    #[tokio::test]
    async fn test_kiosk_punch_refused_in_locked_period() {
        let f = fixture().await;
        lock_week_of_march_10(&f).await;

        assert!(matches!(
            f.punches
                .create(
                    &f.device,
                    kiosk_request(f.employee.id, 12),
                    Utc::now(),
                    RequestMeta::default(),
                )
                .await,
            Err(ServiceError::PeriodLocked(_))
        ));
        assert!(f.store.punches().await.is_empty());
    }

    #[tokio::test]
    async fn test_supervisor_edit_marks_override() {
        let f = fixture().await;
        let punch = seed_punch(&f, 3).await;

        let edited = f
            .punches
            .supervisor_edit(
                &supervisor(),
                punch.id,
                SupervisorEditRequest {
                    reason: Some("wrong button".to_string()),
                    punch_type: Some("out".to_string()),
                    timestamp: None,
                    supervisor_id: Some(77),
                },
                RequestMeta::default(),
            )
            .await
            .unwrap();

        assert_eq!(edited.punch_type, PunchType::Out);
        assert_eq!(edited.timestamp, punch.timestamp);
        assert!(edited.is_override);
        assert_eq!(edited.overridden_by, Some(77));

        let log = &f.store.audit_logs().await[0];
        assert_eq!(log.action, AuditAction::SupervisorEditPunch);
        assert_eq!(log.user_id, Some(50));
        let metadata = log.metadata.as_ref().unwrap();
        assert_eq!(metadata["reason"], json!("wrong button"));
        assert_eq!(metadata["beforeData"]["type"], json!("IN"));
        assert_eq!(metadata["afterData"]["type"], json!("OUT"));
        assert_eq!(metadata["beforeData"]["timestamp"], json!("2025-03-03T08:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_supervisor_edit_requires_reason() {
        let f = fixture().await;
        let punch = seed_punch(&f, 3).await;

        let err = f
            .punches
            .supervisor_edit(
                &supervisor(),
                punch.id,
                SupervisorEditRequest::default(),
                RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "reason is required");
        assert!(!f.store.punches().await[0].is_override);
    }

    #[tokio::test]
    async fn test_edit_into_locked_period_is_refused() {
        let f = fixture().await;
        let punch = seed_punch(&f, 3).await;
        lock_week_of_march_10(&f).await;

        let result = f
            .punches
            .supervisor_edit(
                &supervisor(),
                punch.id,
                SupervisorEditRequest {
                    reason: Some("moved".to_string()),
                    timestamp: Some(at(11, 9)),
                    ..Default::default()
                },
                RequestMeta::default(),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::PeriodLocked(_))));
    }

    #[tokio::test]
    async fn test_other_organization_punch_is_not_found() {
        let f = fixture().await;
        let punch = seed_punch(&f, 3).await;
        let outsider = Principal {
            organization_id: 2,
            ..supervisor()
        };

        let result = f
            .punches
            .supervisor_delete(
                &outsider,
                punch.id,
                SupervisorDeleteRequest {
                    reason: Some("cleanup".to_string()),
                    supervisor_id: None,
                },
                RequestMeta::default(),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound("Punch"))));
        assert_eq!(f.store.punches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_needs_admin_role() {
        let f = fixture().await;
        let punch = seed_punch(&f, 3).await;

        assert!(matches!(
            f.punches.delete(&supervisor(), punch.id, RequestMeta::default()).await,
            Err(ServiceError::Forbidden)
        ));

        let admin = Principal {
            role: Role::Admin,
            ..supervisor()
        };
        let deleted = f
            .punches
            .delete(&admin, punch.id, RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(deleted.id, punch.id);
        assert!(f.store.punches().await.is_empty());
        assert_eq!(f.store.audit_logs().await[0].action, AuditAction::DeletePunch);
    }

    #[tokio::test]
    async fn test_create_shift() {
        let f = fixture().await;

        let punches = f
            .punches
            .create_shift(
                &supervisor(),
                SupervisorShiftRequest {
                    employee_id: Some(f.employee.id),
                    location_id: Some(f.location.id),
                    clock_in: Some(at(4, 8)),
                    clock_out: Some(at(4, 16)),
                    reason: Some("kiosk offline".to_string()),
                    supervisor_id: None,
                },
                RequestMeta::default(),
            )
            .await
            .unwrap();

        assert_eq!(punches.len(), 2);
        assert_eq!(punches[0].punch_type, PunchType::In);
        assert_eq!(punches[1].punch_type, PunchType::Out);
        assert!(punches.iter().all(|p| p.is_override && p.overridden_by == Some(50)));

        let log = &f.store.audit_logs().await[0];
        assert_eq!(log.action, AuditAction::SupervisorCreateShift);
        assert_eq!(log.metadata.as_ref().unwrap()["afterData"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_shift_rejects_inverted_times() {
        let f = fixture().await;

        let err = f
            .punches
            .create_shift(
                &supervisor(),
                SupervisorShiftRequest {
                    employee_id: Some(f.employee.id),
                    location_id: Some(f.location.id),
                    clock_in: Some(at(4, 16)),
                    clock_out: Some(at(4, 8)),
                    reason: Some("typo".to_string()),
                    supervisor_id: None,
                },
                RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "clockOut must be after clockIn");
        assert!(f.store.punches().await.is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_fails_request_but_keeps_mutation() {
        let f = fixture().await;
        f.store.fail_audit_writes(true);

        let result = f
            .punches
            .create(&f.device, kiosk_request(f.employee.id, 10), Utc::now(), RequestMeta::default())
            .await;
        assert!(matches!(result, Err(ServiceError::Audit(_))));
        assert_eq!(f.store.punches().await.len(), 1);
    }
}
