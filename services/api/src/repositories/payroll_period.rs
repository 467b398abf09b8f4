//! Payroll period repository backed by PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;

use super::PayrollPeriodRepository;
use crate::models::{NewPayrollPeriod, PayrollPeriod, PeriodStatus};

const PERIOD_COLUMNS: &str = "id, organization_id, location_id, start_date, end_date, status, \
                              approved_by, approved_at, created_at";

#[derive(Clone)]
pub struct PgPayrollPeriodRepository {
    pool: PgPool,
}

impl PgPayrollPeriodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_period(row: PgRow) -> DatabaseResult<PayrollPeriod> {
    let raw_status: String = row.try_get("status")?;
    let status = raw_status
        .parse::<PeriodStatus>()
        .map_err(|message| DatabaseError::CorruptRow {
            table: "payroll_periods",
            message,
        })?;

    Ok(PayrollPeriod {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        location_id: row.try_get("location_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl PayrollPeriodRepository for PgPayrollPeriodRepository {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>> {
        let row = sqlx::query(&format!(
            "SELECT {PERIOD_COLUMNS} FROM payroll_periods WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_period).transpose()
    }

    async fn insert_if_absent(&self, period: &NewPayrollPeriod) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll_periods (organization_id, location_id, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, 'OPEN')
            "#,
        )
        .bind(period.organization_id)
        .bind(period.location_id)
        .bind(period.start_date)
        .bind(period.end_date)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from);

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_unique_violation() => {
                debug!(
                    location_id = ?period.location_id,
                    start_date = %period.start_date,
                    "Payroll period already exists"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn approve(
        &self,
        id: i64,
        approver_id: i64,
        approved_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<PayrollPeriod>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payroll_periods
            SET status = 'APPROVED', approved_by = $2, approved_at = $3
            WHERE id = $1 AND status = 'OPEN'
            RETURNING {PERIOD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(approver_id)
        .bind(approved_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_period).transpose()
    }

    async fn lock(&self, id: i64) -> DatabaseResult<Option<PayrollPeriod>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payroll_periods
            SET status = 'LOCKED'
            WHERE id = $1 AND status = 'APPROVED'
            RETURNING {PERIOD_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_period).transpose()
    }

    async fn is_frozen(
        &self,
        organization_id: i64,
        location_id: Option<i64>,
        date: NaiveDate,
    ) -> DatabaseResult<bool> {
        let frozen: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM payroll_periods
                WHERE organization_id = $1
                  AND (location_id IS NULL OR location_id = $2)
                  AND start_date <= $3
                  AND end_date > $3
                  AND status IN ('APPROVED', 'LOCKED')
            )
            "#,
        )
        .bind(organization_id)
        .bind(location_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(frozen)
    }
}
