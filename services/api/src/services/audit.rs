//! Audit log recorder
//!
//! Every mutation ends with one call to [`AuditRecorder::record`]. Entries
//! arrive either as a typed [`AuditEntry`] built by the services or as a
//! [`RawAuditEntry`] posted by integrations that still speak the legacy
//! `tableName`/`recordId`/`supervisorId` shape. [`RawAuditEntry::normalize`]
//! is the single place where the two shapes are reconciled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::{ServiceError, ServiceResult, require_roles, required};
use crate::{
    models::{
        ADMIN_ROLES, AuditAction, AuditLog, AuditLogQuery, NewAuditLog, Principal, iso_timestamp,
    },
    repositories::AuditLogRepository,
};

/// Who performed the action. Kiosk and scheduled actions have no user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub email: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self::default()
    }
}

impl From<&Principal> for Actor {
    fn from(principal: &Principal) -> Self {
        Self {
            user_id: Some(principal.user_id),
            email: Some(principal.email.clone()),
        }
    }
}

/// HTTP context of the request that caused the action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: Option<String>,
    pub path: Option<String>,
    pub ip: Option<String>,
}

/// What the action touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditTarget {
    Entity {
        entity_type: String,
        entity_id: String,
    },
    /// Older integrations address rows by table
    Legacy { table_name: String, record_id: String },
}

impl AuditTarget {
    pub fn entity(entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        AuditTarget::Entity {
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
        }
    }

    fn into_columns(self) -> (String, String) {
        match self {
            AuditTarget::Entity {
                entity_type,
                entity_id,
            } => (entity_type, entity_id),
            AuditTarget::Legacy {
                table_name,
                record_id,
            } => (table_name, record_id),
        }
    }
}

/// Canonical audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub organization_id: Option<i64>,
    pub actor: Actor,
    pub target: AuditTarget,
    pub request: RequestMeta,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub reason: Option<String>,
    pub metadata: Map<String, Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, target: AuditTarget) -> Self {
        Self {
            action,
            organization_id: None,
            actor: Actor::system(),
            target,
            request: RequestMeta::default(),
            before: None,
            after: None,
            reason: None,
            metadata: Map::new(),
        }
    }

    pub fn organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn request(mut self, request: RequestMeta) -> Self {
        self.request = request;
        self
    }

    pub fn before(mut self, snapshot: Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: Value) -> Self {
        self.after = Some(snapshot);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Flatten into the stored row: snapshots and reason join the metadata
    /// object, dates are canonicalized and an empty object becomes `None`.
    pub fn into_row(self) -> NewAuditLog {
        let mut metadata = self.metadata;
        if let Some(before) = self.before {
            metadata.insert("beforeData".to_string(), before);
        }
        if let Some(after) = self.after {
            metadata.insert("afterData".to_string(), after);
        }
        if let Some(reason) = self.reason {
            metadata.insert("reason".to_string(), Value::String(reason));
        }

        let metadata = if metadata.is_empty() {
            None
        } else {
            let mut value = Value::Object(metadata);
            canonicalize_dates(&mut value);
            Some(value)
        };

        let (entity_type, entity_id) = self.target.into_columns();
        NewAuditLog {
            action: self.action,
            organization_id: self.organization_id,
            user_id: self.actor.user_id,
            user_email: self.actor.email,
            entity_type,
            entity_id,
            method: self.request.method,
            path: self.request.path,
            ip: self.request.ip,
            metadata,
        }
    }
}

/// JSON snapshot of a record for the before/after audit fields.
pub(crate) fn snapshot<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

/// Rewrite every RFC 3339 string in the tree to UTC with millisecond precision.
pub fn canonicalize_dates(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
                *text = iso_timestamp(&instant.with_timezone(&Utc));
            }
        }
        Value::Array(items) => items.iter_mut().for_each(canonicalize_dates),
        Value::Object(fields) => fields.values_mut().for_each(canonicalize_dates),
        _ => {}
    }
}

/// Audit entry as posted by integrations, accepting both field generations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditEntry {
    pub action: Option<AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Value>,
    pub table_name: Option<String>,
    pub record_id: Option<Value>,
    pub user_id: Option<i64>,
    pub supervisor_id: Option<i64>,
    pub user_email: Option<String>,
    pub before_data: Option<Value>,
    pub after_data: Option<Value>,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub ip: Option<String>,
}

impl RawAuditEntry {
    /// Reconcile legacy and current fields into one [`AuditEntry`].
    ///
    /// Current fields win; a legacy value that lost is kept in metadata under
    /// a `legacy*` key. Without any entity type the action's default is used.
    pub fn normalize(self) -> ServiceResult<AuditEntry> {
        let action = required(self.action, "action")?;

        let mut metadata = match self.metadata {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(fields)) => fields,
            Some(_) => {
                return Err(ServiceError::Validation(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        };

        let entity_id = self.entity_id.map(coerce_id).transpose()?.flatten();
        let record_id = self.record_id.map(coerce_id).transpose()?.flatten();

        let target = match (self.entity_type, self.table_name) {
            (Some(entity_type), table_name) => {
                if let Some(table_name) = table_name {
                    metadata.insert("legacyTableName".to_string(), Value::String(table_name));
                }
                let entity_id = match (entity_id, record_id) {
                    (Some(entity_id), Some(record_id)) => {
                        metadata.insert("legacyRecordId".to_string(), Value::String(record_id));
                        entity_id
                    }
                    (Some(entity_id), None) => entity_id,
                    (None, Some(record_id)) => record_id,
                    (None, None) => return Err(missing_id()),
                };
                AuditTarget::Entity {
                    entity_type,
                    entity_id,
                }
            }
            (None, Some(table_name)) => {
                let record_id = match (entity_id, record_id) {
                    (Some(entity_id), Some(record_id)) => {
                        metadata.insert("legacyRecordId".to_string(), Value::String(record_id));
                        entity_id
                    }
                    (Some(id), None) | (None, Some(id)) => id,
                    (None, None) => return Err(missing_id()),
                };
                AuditTarget::Legacy {
                    table_name,
                    record_id,
                }
            }
            (None, None) => {
                let entity_id = entity_id.or(record_id).ok_or_else(missing_id)?;
                AuditTarget::entity(action.entity_type(), entity_id)
            }
        };

        let user_id = match (self.user_id, self.supervisor_id) {
            (Some(user_id), Some(supervisor_id)) => {
                metadata.insert("legacySupervisorId".to_string(), supervisor_id.into());
                Some(user_id)
            }
            (user_id, supervisor_id) => user_id.or(supervisor_id),
        };

        Ok(AuditEntry {
            action,
            organization_id: None,
            actor: Actor {
                user_id,
                email: self.user_email,
            },
            target,
            request: RequestMeta {
                method: self.method,
                path: self.path,
                ip: self.ip,
            },
            before: self.before_data,
            after: self.after_data,
            reason: self.reason,
            metadata,
        })
    }
}

fn missing_id() -> ServiceError {
    ServiceError::Validation("entityId is required".to_string())
}

/// Entity ids are stored as text whatever their JSON type.
fn coerce_id(value: Value) -> ServiceResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        _ => Err(ServiceError::Validation(
            "entityId must be a string or a number".to_string(),
        )),
    }
}

/// Persists audit entries, one row per call
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditRecorder {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    /// Write one audit row. A failure is logged here and returned as
    /// [`ServiceError::Audit`]; the caller's mutation is already committed.
    pub async fn record(&self, entry: AuditEntry) -> ServiceResult<AuditLog> {
        let row = entry.into_row();
        match self.repository.insert(&row).await {
            Ok(log) => {
                info!(
                    action = %log.action,
                    entity_type = %log.entity_type,
                    entity_id = %log.entity_id,
                    "Audit log recorded"
                );
                Ok(log)
            }
            Err(e) => {
                error!(
                    action = %row.action,
                    entity_type = %row.entity_type,
                    entity_id = %row.entity_id,
                    "Failed to write audit log: {}",
                    e
                );
                Err(ServiceError::Audit(e))
            }
        }
    }

    /// Audit trail of the principal's organization, newest first.
    pub async fn list(
        &self,
        principal: &Principal,
        query: &AuditLogQuery,
    ) -> ServiceResult<Vec<AuditLog>> {
        require_roles(principal, ADMIN_ROLES)?;
        Ok(self
            .repository
            .list(principal.organization_id, query)
            .await?)
    }

    /// Ingest an entry posted by an integration on behalf of `principal`.
    pub async fn ingest(
        &self,
        principal: &Principal,
        raw: RawAuditEntry,
        request: RequestMeta,
    ) -> ServiceResult<AuditLog> {
        require_roles(principal, ADMIN_ROLES)?;
        let mut entry = raw.normalize()?.organization(principal.organization_id);
        if entry.actor.user_id.is_none() {
            entry.actor = Actor::from(principal);
        }
        if entry.request == RequestMeta::default() {
            entry.request = request;
        }
        self.record(entry).await
    }
}
