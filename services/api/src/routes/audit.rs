//! Audit log handlers

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::ApiResult,
    models::{AuditLogQuery, Principal},
    services::{RawAuditEntry, RequestMeta},
    state::AppState,
};

pub async fn list_audit_logs(
    State(state): State<AppState>,
    principal: Principal,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let logs = state.audit.list(&principal, &query).await?;

    Ok(Json(logs))
}

/// Record an entry posted by an integration
pub async fn create_audit_log(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    payload: Result<Json<RawAuditEntry>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let log = state.audit.ingest(&principal, payload, meta).await?;

    Ok((StatusCode::CREATED, Json(log)))
}
