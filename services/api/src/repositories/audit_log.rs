//! Audit log repository backed by PostgreSQL

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::AuditLogRepository;
use crate::models::{AuditAction, AuditLog, AuditLogQuery, NewAuditLog};

const AUDIT_COLUMNS: &str = "id, action, organization_id, user_id, user_email, entity_type, \
                             entity_id, method, path, ip, metadata, created_at";

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct PgAuditLogRepository {
    pool: PgPool,
}

impl PgAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_audit_log(row: PgRow) -> DatabaseResult<AuditLog> {
    let raw_action: String = row.try_get("action")?;
    let action = raw_action
        .parse::<AuditAction>()
        .map_err(|message| DatabaseError::CorruptRow {
            table: "audit_logs",
            message,
        })?;

    Ok(AuditLog {
        id: row.try_get("id")?,
        action,
        organization_id: row.try_get("organization_id")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        ip: row.try_get("ip")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn insert(&self, entry: &NewAuditLog) -> DatabaseResult<AuditLog> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO audit_logs
                (action, organization_id, user_id, user_email, entity_type, entity_id,
                 method, path, ip, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(entry.action.as_str())
        .bind(entry.organization_id)
        .bind(entry.user_id)
        .bind(&entry.user_email)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.method)
        .bind(&entry.path)
        .bind(&entry.ip)
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await?;

        map_audit_log(row)
    }

    async fn list(
        &self,
        organization_id: i64,
        query: &AuditLogQuery,
    ) -> DatabaseResult<Vec<AuditLog>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_logs
            WHERE organization_id = $1
              AND ($2::TEXT IS NULL OR action = $2)
              AND ($3::TEXT IS NULL OR entity_type = $3)
              AND ($4::TEXT IS NULL OR entity_id = $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#
        ))
        .bind(organization_id)
        .bind(query.action.map(AuditAction::as_str))
        .bind(&query.entity_type)
        .bind(&query.entity_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_audit_log).collect()
    }
}
