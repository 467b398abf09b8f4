//! Payroll period lifecycle and lock checks
//!
//! Fixed-length cadences (weekly, biweekly) get their periods materialized
//! ahead of time so they can be approved and locked. Calendar cadences are
//! computed on demand and never stored.

use std::sync::Arc;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use common::pay_period::{PayPeriodRange, compute_pay_period};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    Actor, AuditEntry, AuditRecorder, AuditTarget, RequestMeta, ServiceError, ServiceResult,
    audit::snapshot, require_roles,
};
use crate::{
    models::{
        ADMIN_ROLES, AuditAction, Location, NewPayrollPeriod, PayrollPeriod, PeriodStatus,
        Principal,
    },
    repositories::{DirectoryRepository, PayrollPeriodRepository},
    validation::validate_window_months,
};

/// How far around today periods are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationWindow {
    pub months_ahead: u32,
    pub months_back: u32,
}

impl Default for GenerationWindow {
    fn default() -> Self {
        Self {
            months_ahead: 3,
            months_back: 1,
        }
    }
}

impl GenerationWindow {
    /// Build a window, filling gaps from `defaults` and enforcing 0..=24 months.
    pub fn new(
        months_ahead: Option<u32>,
        months_back: Option<u32>,
        defaults: GenerationWindow,
    ) -> ServiceResult<Self> {
        let months_ahead = validate_window_months(
            "monthsAhead",
            months_ahead.unwrap_or(defaults.months_ahead),
        )
        .map_err(ServiceError::Validation)?;
        let months_back = validate_window_months(
            "monthsBack",
            months_back.unwrap_or(defaults.months_back),
        )
        .map_err(ServiceError::Validation)?;

        Ok(Self {
            months_ahead,
            months_back,
        })
    }

    /// `[today - months_back, today + months_ahead]`
    pub fn bounds(&self, today: NaiveDate) -> ServiceResult<(NaiveDate, NaiveDate)> {
        let from = today
            .checked_sub_months(Months::new(self.months_back))
            .ok_or_else(|| ServiceError::Validation("monthsBack is out of range".to_string()))?;
        let to = today
            .checked_add_months(Months::new(self.months_ahead))
            .ok_or_else(|| ServiceError::Validation("monthsAhead is out of range".to_string()))?;
        Ok((from, to))
    }
}

#[derive(Clone)]
pub struct PayrollService {
    periods: Arc<dyn PayrollPeriodRepository>,
    directory: Arc<dyn DirectoryRepository>,
    audit: AuditRecorder,
}

impl PayrollService {
    pub fn new(
        periods: Arc<dyn PayrollPeriodRepository>,
        directory: Arc<dyn DirectoryRepository>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            periods,
            directory,
            audit,
        }
    }

    /// Materialize periods for every fixed-cadence location, optionally
    /// restricted to one organization. Existing periods are left alone, so
    /// running this twice creates nothing the second time.
    pub async fn generate(
        &self,
        organization_id: Option<i64>,
        today: NaiveDate,
        window: GenerationWindow,
    ) -> ServiceResult<u64> {
        let (from, to) = window.bounds(today)?;
        let locations = self.directory.list_locations().await?;

        let mut created = 0;
        for location in locations
            .iter()
            .filter(|l| organization_id.is_none_or(|org| l.organization_id == org))
        {
            created += self.generate_for_location(location, from, to).await?;
        }

        info!(
            created,
            from = %from,
            to = %to,
            "Payroll period generation finished"
        );
        Ok(created)
    }

    async fn generate_for_location(
        &self,
        location: &Location,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<u64> {
        let policy = match location.policy() {
            Ok(policy) => policy,
            Err(e) => {
                warn!(
                    location_id = location.id,
                    "Skipping location with invalid pay cadence: {}",
                    e
                );
                return Ok(0);
            }
        };

        let Some(step) = policy.cadence.step_days() else {
            debug!(
                location_id = location.id,
                cadence = %policy.cadence,
                "Calendar cadence, periods are computed on demand"
            );
            return Ok(0);
        };

        let mut start = match compute_pay_period(&policy, from) {
            Ok(range) => range.start_date,
            Err(e) => {
                warn!(location_id = location.id, "Skipping location: {}", e);
                return Ok(0);
            }
        };

        let mut created = 0;
        while start < to {
            let Some(end) = start.checked_add_days(Days::new(step)) else {
                break;
            };

            let inserted = self
                .periods
                .insert_if_absent(&NewPayrollPeriod {
                    organization_id: location.organization_id,
                    location_id: Some(location.id),
                    start_date: start,
                    end_date: end,
                })
                .await?;
            if inserted {
                created += 1;
            }
            start = end;
        }

        Ok(created)
    }

    /// Generation triggered by an administrator for their own organization.
    pub async fn generate_for(
        &self,
        principal: &Principal,
        today: NaiveDate,
        window: GenerationWindow,
        request: RequestMeta,
    ) -> ServiceResult<u64> {
        require_roles(principal, ADMIN_ROLES)?;
        let created = self
            .generate(Some(principal.organization_id), today, window)
            .await?;

        if created > 0 {
            self.audit
                .record(
                    AuditEntry::new(
                        AuditAction::PayrollPeriodsGenerated,
                        AuditTarget::entity("Organization", principal.organization_id),
                    )
                    .organization(principal.organization_id)
                    .actor(Actor::from(principal))
                    .request(request)
                    .meta("createdCount", created)
                    .meta("monthsAhead", window.months_ahead)
                    .meta("monthsBack", window.months_back),
                )
                .await?;
        }

        Ok(created)
    }

    /// OPEN -> APPROVED
    pub async fn approve(
        &self,
        principal: &Principal,
        id: i64,
        now: DateTime<Utc>,
        request: RequestMeta,
    ) -> ServiceResult<PayrollPeriod> {
        require_roles(principal, ADMIN_ROLES)?;
        let before = self.find_in_organization(principal, id).await?;
        expect_status(&before, PeriodStatus::Open, "approved")?;

        let period = self
            .periods
            .approve(id, principal.user_id, now)
            .await?
            .ok_or_else(|| status_error(PeriodStatus::Open, "approved"))?;
        info!(period_id = id, approved_by = principal.user_id, "Payroll period approved");

        self.audit_transition(
            principal,
            AuditAction::PayrollPeriodApproved,
            &before,
            &period,
            request,
        )
        .await?;
        Ok(period)
    }

    /// APPROVED -> LOCKED
    pub async fn lock(
        &self,
        principal: &Principal,
        id: i64,
        request: RequestMeta,
    ) -> ServiceResult<PayrollPeriod> {
        require_roles(principal, ADMIN_ROLES)?;
        let before = self.find_in_organization(principal, id).await?;
        expect_status(&before, PeriodStatus::Approved, "locked")?;

        let period = self
            .periods
            .lock(id)
            .await?
            .ok_or_else(|| status_error(PeriodStatus::Approved, "locked"))?;
        info!(period_id = id, locked_by = principal.user_id, "Payroll period locked");

        self.audit_transition(
            principal,
            AuditAction::PayrollPeriodLocked,
            &before,
            &period,
            request,
        )
        .await?;
        Ok(period)
    }

    /// Whether punches dated `date` are frozen. Without a location only
    /// organization-wide periods count.
    pub async fn is_date_locked(
        &self,
        organization_id: i64,
        location_id: Option<i64>,
        date: NaiveDate,
    ) -> ServiceResult<bool> {
        Ok(self
            .periods
            .is_frozen(organization_id, location_id, date)
            .await?)
    }

    /// Fail with [`ServiceError::PeriodLocked`] when `date` is frozen.
    pub async fn ensure_unlocked(
        &self,
        organization_id: i64,
        location_id: i64,
        date: NaiveDate,
    ) -> ServiceResult<()> {
        if self
            .is_date_locked(organization_id, Some(location_id), date)
            .await?
        {
            warn!(
                organization_id,
                location_id,
                date = %date,
                "Refused change inside locked payroll period"
            );
            return Err(ServiceError::PeriodLocked(date));
        }
        Ok(())
    }

    /// On-demand period containing `date` for one of the principal's locations.
    pub async fn current_period(
        &self,
        principal: &Principal,
        location_id: i64,
        date: NaiveDate,
    ) -> ServiceResult<PayPeriodRange> {
        let location = self
            .directory
            .find_location(location_id)
            .await?
            .filter(|l| l.organization_id == principal.organization_id)
            .ok_or(ServiceError::NotFound("Location"))?;

        Ok(compute_pay_period(&location.policy()?, date)?)
    }

    async fn find_in_organization(
        &self,
        principal: &Principal,
        id: i64,
    ) -> ServiceResult<PayrollPeriod> {
        self.periods
            .find_by_id(id)
            .await?
            .filter(|p| p.organization_id == principal.organization_id)
            .ok_or(ServiceError::NotFound("Payroll period"))
    }

    async fn audit_transition(
        &self,
        principal: &Principal,
        action: AuditAction,
        before: &PayrollPeriod,
        after: &PayrollPeriod,
        request: RequestMeta,
    ) -> ServiceResult<()> {
        self.audit
            .record(
                AuditEntry::new(action, AuditTarget::entity("PayrollPeriod", after.id))
                    .organization(principal.organization_id)
                    .actor(Actor::from(principal))
                    .request(request)
                    .before(snapshot(before))
                    .after(snapshot(after))
                    .meta(
                        "range",
                        json!({"startDate": after.start_date, "endDate": after.end_date}),
                    ),
            )
            .await?;
        Ok(())
    }
}

fn expect_status(period: &PayrollPeriod, expected: PeriodStatus, verb: &str) -> ServiceResult<()> {
    if period.status == expected {
        Ok(())
    } else {
        Err(status_error(expected, verb))
    }
}

fn status_error(expected: PeriodStatus, verb: &str) -> ServiceError {
    ServiceError::Validation(format!(
        "Only {} payroll periods can be {}",
        expected, verb
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Role, repositories::memory::MemoryStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn principal(role: Role, organization_id: i64) -> Principal {
        Principal {
            user_id: 7,
            organization_id,
            role,
            email: "payroll@example.com".to_string(),
        }
    }

    fn service(store: &Arc<MemoryStore>) -> PayrollService {
        PayrollService::new(store.clone(), store.clone(), AuditRecorder::new(store.clone()))
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.add_location(1, "Weekly", "WEEKLY", Some(1), None).await;
        store
            .add_location(1, "Biweekly", "BIWEEKLY", None, Some(date(2025, 1, 1)))
            .await;
        store.add_location(1, "Monthly", "MONTHLY", None, None).await;
        let payroll = service(&store);
        let window = GenerationWindow::default();

        let first = payroll.generate(None, date(2025, 3, 10), window).await.unwrap();
        assert!(first > 0);
        let second = payroll.generate(None, date(2025, 3, 10), window).await.unwrap();
        assert_eq!(second, 0);

        let periods = store.periods().await;
        assert_eq!(periods.len() as u64, first);
        assert!(periods.iter().all(|p| p.status == PeriodStatus::Open));
        assert!(periods.iter().all(|p| (p.end_date - p.start_date).num_days() % 7 == 0));
    }

    #[tokio::test]
    async fn test_weekly_generation_covers_window() {
        let store = Arc::new(MemoryStore::new());
        let location = store.add_location(1, "Weekly", "WEEKLY", Some(1), None).await;
        let payroll = service(&store);
        let window = GenerationWindow::new(Some(1), Some(0), GenerationWindow::default()).unwrap();

        // Monday 2025-03-10 .. 2025-04-10: Mondays 10, 17, 24, 31 and 7 April
        let created = payroll.generate(None, date(2025, 3, 10), window).await.unwrap();
        assert_eq!(created, 5);

        let periods = store.periods().await;
        assert_eq!(periods[0].start_date, date(2025, 3, 10));
        assert_eq!(periods[4].end_date, date(2025, 4, 14));
        assert!(periods.iter().all(|p| p.location_id == Some(location.id)));
    }

    #[tokio::test]
    async fn test_misconfigured_location_does_not_stop_batch() {
        let store = Arc::new(MemoryStore::new());
        store.add_location(1, "Broken", "BIWEEKLY", None, None).await;
        store.add_location(1, "Odd", "FORTNIGHTLY", None, None).await;
        store.add_location(1, "Weekly", "WEEKLY", Some(0), None).await;
        let payroll = service(&store);

        let created = payroll
            .generate(None, date(2025, 3, 10), GenerationWindow::default())
            .await
            .unwrap();
        assert!(created > 0);
    }

    #[tokio::test]
    async fn test_generation_scoped_to_organization() {
        let store = Arc::new(MemoryStore::new());
        store.add_location(1, "Ours", "WEEKLY", Some(1), None).await;
        store.add_location(2, "Theirs", "WEEKLY", Some(1), None).await;
        let payroll = service(&store);

        payroll
            .generate_for(
                &principal(Role::Admin, 1),
                date(2025, 3, 10),
                GenerationWindow::default(),
                RequestMeta::default(),
            )
            .await
            .unwrap();

        assert!(store.periods().await.iter().all(|p| p.organization_id == 1));
        let logs = store.audit_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::PayrollPeriodsGenerated);
    }

    #[test]
    fn test_window_bounds_enforced() {
        let defaults = GenerationWindow::default();
        assert_eq!(
            GenerationWindow::new(None, None, defaults).unwrap(),
            defaults
        );
        assert!(matches!(
            GenerationWindow::new(Some(25), None, defaults),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_check_follows_status() {
        let store = Arc::new(MemoryStore::new());
        let location = store.add_location(1, "Weekly", "WEEKLY", Some(1), None).await;
        let payroll = service(&store);
        let day = date(2025, 3, 10);

        let open = store
            .add_period(
                1,
                Some(location.id),
                date(2025, 3, 10),
                date(2025, 3, 17),
                PeriodStatus::Open,
            )
            .await;
        assert!(!payroll.is_date_locked(1, Some(location.id), day).await.unwrap());

        let admin = principal(Role::Manager, 1);
        payroll
            .approve(&admin, open.id, Utc::now(), RequestMeta::default())
            .await
            .unwrap();
        assert!(payroll.is_date_locked(1, Some(location.id), day).await.unwrap());

        // the exclusive end is outside the period
        assert!(!payroll.is_date_locked(1, Some(location.id), date(2025, 3, 17)).await.unwrap());
        // location-scoped periods do not count without a location
        assert!(!payroll.is_date_locked(1, None, day).await.unwrap());
        // nor for another organization
        assert!(!payroll.is_date_locked(2, Some(location.id), day).await.unwrap());
    }

    #[tokio::test]
    async fn test_org_wide_period_freezes_every_location() {
        let store = Arc::new(MemoryStore::new());
        let payroll = service(&store);
        store
            .add_period(1, None, date(2025, 3, 1), date(2025, 4, 1), PeriodStatus::Locked)
            .await;

        assert!(payroll.is_date_locked(1, None, date(2025, 3, 10)).await.unwrap());
        assert!(payroll.is_date_locked(1, Some(99), date(2025, 3, 10)).await.unwrap());
        assert!(matches!(
            payroll.ensure_unlocked(1, 99, date(2025, 3, 10)).await,
            Err(ServiceError::PeriodLocked(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_rules() {
        let store = Arc::new(MemoryStore::new());
        let payroll = service(&store);
        let period = store
            .add_period(1, None, date(2025, 3, 1), date(2025, 3, 15), PeriodStatus::Open)
            .await;

        assert!(matches!(
            payroll
                .approve(
                    &principal(Role::Supervisor, 1),
                    period.id,
                    Utc::now(),
                    RequestMeta::default(),
                )
                .await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            payroll
                .approve(&principal(Role::Admin, 2), period.id, Utc::now(), RequestMeta::default())
                .await,
            Err(ServiceError::NotFound(_))
        ));

        let approved = payroll
            .approve(&principal(Role::Owner, 1), period.id, Utc::now(), RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(approved.status, PeriodStatus::Approved);
        assert_eq!(approved.approved_by, Some(7));
        assert!(approved.approved_at.is_some());

        assert!(matches!(
            payroll
                .approve(&principal(Role::Owner, 1), period.id, Utc::now(), RequestMeta::default())
                .await,
            Err(ServiceError::Validation(_))
        ));

        let logs = store.audit_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::PayrollPeriodApproved);
        assert_eq!(logs[0].entity_id, period.id.to_string());
    }

    #[tokio::test]
    async fn test_lock_requires_approval() {
        let store = Arc::new(MemoryStore::new());
        let payroll = service(&store);
        let admin = principal(Role::Admin, 1);
        let period = store
            .add_period(1, None, date(2025, 3, 1), date(2025, 3, 15), PeriodStatus::Open)
            .await;

        assert!(matches!(
            payroll.lock(&admin, period.id, RequestMeta::default()).await,
            Err(ServiceError::Validation(_))
        ));

        payroll
            .approve(&admin, period.id, Utc::now(), RequestMeta::default())
            .await
            .unwrap();
        let locked = payroll
            .lock(&admin, period.id, RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(locked.status, PeriodStatus::Locked);
    }

    #[tokio::test]
    async fn test_current_period_uses_location_policy() {
        let store = Arc::new(MemoryStore::new());
        let location = store
            .add_location(1, "Biweekly", "BIWEEKLY", None, Some(date(2025, 1, 1)))
            .await;
        let payroll = service(&store);

        let range = payroll
            .current_period(&principal(Role::Employee, 1), location.id, date(2025, 1, 10))
            .await
            .unwrap();
        assert_eq!(range.start_date, date(2025, 1, 15));
        assert_eq!(range.end_date, date(2025, 1, 29));

        assert!(matches!(
            payroll
                .current_period(&principal(Role::Employee, 2), location.id, date(2025, 1, 10))
                .await,
            Err(ServiceError::NotFound("Location"))
        ));
    }
}
