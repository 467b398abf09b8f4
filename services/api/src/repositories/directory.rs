//! Employee and location lookups backed by PostgreSQL
//!
//! Locations inherit the pay cadence of their organization unless they carry
//! their own, so the join resolves the effective columns up front.

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::DirectoryRepository;
use crate::models::{Employee, Location};

const LOCATION_SELECT: &str = r#"
    SELECT l.id,
           l.organization_id,
           l.name,
           COALESCE(l.pay_cadence, o.pay_cadence) AS pay_cadence,
           COALESCE(l.week_start_day, o.week_start_day) AS week_start_day,
           COALESCE(l.biweekly_anchor_date, o.biweekly_anchor_date) AS biweekly_anchor_date
    FROM locations l
    JOIN organizations o ON o.id = l.organization_id
"#;

#[derive(Clone)]
pub struct PgDirectoryRepository {
    pool: PgPool,
}

impl PgDirectoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_location(row: PgRow) -> DatabaseResult<Location> {
    Ok(Location {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        pay_cadence: row.try_get("pay_cadence")?,
        week_start_day: row.try_get("week_start_day")?,
        biweekly_anchor_date: row.try_get("biweekly_anchor_date")?,
    })
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn find_employee(&self, id: i64) -> DatabaseResult<Option<Employee>> {
        let row = sqlx::query("SELECT id, organization_id, name FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Employee {
                id: row.try_get("id")?,
                organization_id: row.try_get("organization_id")?,
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_location(&self, id: i64) -> DatabaseResult<Option<Location>> {
        let row = sqlx::query(&format!("{LOCATION_SELECT} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(map_location).transpose()
    }

    async fn list_locations(&self) -> DatabaseResult<Vec<Location>> {
        let rows = sqlx::query(&format!("{LOCATION_SELECT} ORDER BY l.id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(map_location).collect()
    }
}
