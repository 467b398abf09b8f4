//! Punch and supervisor override handlers

use std::convert::Infallible;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::{
    error::ApiResult,
    models::{
        CreatePunchRequest, DeviceContext, Principal, SupervisorDeleteRequest,
        SupervisorEditRequest, SupervisorShiftRequest,
    },
    services::RequestMeta,
    state::AppState,
};

/// Kiosk punch
pub async fn create_punch(
    State(state): State<AppState>,
    device: DeviceContext,
    meta: RequestMeta,
    payload: Result<Json<CreatePunchRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let punch = state
        .punches
        .create(&device, payload, Utc::now(), meta)
        .await?;

    Ok(Json(json!({ "success": true, "punch": punch })))
}

pub async fn delete_punch(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let punch = state.punches.delete(&principal, id, meta).await?;

    Ok(Json(json!({ "success": true, "punch": punch })))
}

pub async fn supervisor_edit(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SupervisorEditRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let punch = state
        .punches
        .supervisor_edit(&principal, id, payload, meta)
        .await?;

    Ok(Json(json!({ "success": true, "punch": punch })))
}

pub async fn supervisor_delete(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SupervisorDeleteRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let punch = state
        .punches
        .supervisor_delete(&principal, id, payload, meta)
        .await?;

    Ok(Json(json!({ "success": true, "punch": punch })))
}

pub async fn supervisor_shift(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    payload: Result<Json<SupervisorShiftRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let punches = state
        .punches
        .create_shift(&principal, payload, meta)
        .await?;

    Ok(Json(json!({ "success": true, "punches": punches })))
}

/// Live punch feed of the caller's organization
pub async fn stream_punches(
    State(state): State<AppState>,
    principal: Principal,
) -> impl IntoResponse {
    let events = state
        .broadcaster
        .stream_for(principal.organization_id)
        .filter_map(|event| match Event::default().event("punch").json_data(&event) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!(punch_id = event.punch_id, "Failed to encode punch event: {}", e);
                None
            }
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}
