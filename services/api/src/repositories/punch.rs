//! Punch repository backed by PostgreSQL

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::PunchRepository;
use crate::models::{NewPunch, Punch, PunchChanges, PunchType};

const PUNCH_COLUMNS: &str = "id, organization_id, employee_id, location_id, type, timestamp, \
                             device_id, is_override, overridden_by, created_at, updated_at";

#[derive(Clone)]
pub struct PgPunchRepository {
    pool: PgPool,
}

impl PgPunchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_punch(row: PgRow) -> DatabaseResult<Punch> {
    let raw_type: String = row.try_get("type")?;
    let punch_type = raw_type
        .parse::<PunchType>()
        .map_err(|message| DatabaseError::CorruptRow {
            table: "punches",
            message,
        })?;

    Ok(Punch {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        employee_id: row.try_get("employee_id")?,
        location_id: row.try_get("location_id")?,
        punch_type,
        timestamp: row.try_get("timestamp")?,
        device_id: row.try_get("device_id")?,
        is_override: row.try_get("is_override")?,
        overridden_by: row.try_get("overridden_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PunchRepository for PgPunchRepository {
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Punch>> {
        let row = sqlx::query(&format!("SELECT {PUNCH_COLUMNS} FROM punches WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(map_punch).transpose()
    }

    async fn create(&self, punch: &NewPunch) -> DatabaseResult<Punch> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO punches
                (organization_id, employee_id, location_id, type, timestamp,
                 device_id, is_override, overridden_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PUNCH_COLUMNS}
            "#
        ))
        .bind(punch.organization_id)
        .bind(punch.employee_id)
        .bind(punch.location_id)
        .bind(punch.punch_type.as_str())
        .bind(punch.timestamp)
        .bind(&punch.device_id)
        .bind(punch.is_override)
        .bind(punch.overridden_by)
        .fetch_one(&self.pool)
        .await?;

        map_punch(row)
    }

    async fn update(&self, id: i64, changes: &PunchChanges) -> DatabaseResult<Option<Punch>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE punches
            SET type = COALESCE($2, type),
                timestamp = COALESCE($3, timestamp),
                is_override = TRUE,
                overridden_by = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING {PUNCH_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.punch_type.map(PunchType::as_str))
        .bind(changes.timestamp)
        .bind(changes.overridden_by)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_punch).transpose()
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM punches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
