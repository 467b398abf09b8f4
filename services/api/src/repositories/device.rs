//! Device repository backed by PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;

use super::DeviceRepository;
use crate::models::Device;

const DEVICE_COLUMNS: &str =
    "id, device_id, location_id, name, is_approved, is_active, last_seen_at, created_at";

#[derive(Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_device(row: PgRow) -> DatabaseResult<Device> {
    Ok(Device {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        location_id: row.try_get("location_id")?,
        name: row.try_get("name")?,
        is_approved: row.try_get("is_approved")?,
        is_active: row.try_get("is_active")?,
        last_seen_at: row.try_get("last_seen_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn find_by_device_id(&self, device_id: &str) -> DatabaseResult<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = $1"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_device).transpose()
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Device>> {
        let row = sqlx::query(&format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(map_device).transpose()
    }

    async fn register(
        &self,
        device_id: &str,
        location_id: i64,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<Device>> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO devices (device_id, location_id, is_approved, is_active, last_seen_at)
            VALUES ($1, $2, FALSE, TRUE, $3)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(device_id)
        .bind(location_id)
        .bind(seen_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from);

        match result {
            Ok(row) => map_device(row).map(Some),
            Err(e) if e.is_unique_violation() => {
                debug!(device_id, "Device registered by a concurrent request");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn touch(
        &self,
        id: i64,
        location_id: Option<i64>,
        seen_at: DateTime<Utc>,
    ) -> DatabaseResult<Device> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE devices
            SET last_seen_at = $2,
                location_id = COALESCE($3, location_id)
            WHERE id = $1
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(seen_at)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        map_device(row)
    }

    async fn set_approved(&self, id: i64, approved: bool) -> DatabaseResult<Option<Device>> {
        let row = sqlx::query(&format!(
            "UPDATE devices SET is_approved = $2 WHERE id = $1 RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(id)
        .bind(approved)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_device).transpose()
    }

    async fn set_active(&self, id: i64, active: bool) -> DatabaseResult<Option<Device>> {
        let row = sqlx::query(&format!(
            "UPDATE devices SET is_active = $2 WHERE id = $1 RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_device).transpose()
    }
}
