//! Device administration handlers

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::IntoResponse,
};

use crate::{error::ApiResult, models::Principal, services::RequestMeta, state::AppState};

pub async fn approve_device(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let device = state.devices.approve(&principal, id, meta).await?;

    Ok(Json(device))
}

pub async fn deactivate_device(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let device = state.devices.deactivate(&principal, id, meta).await?;

    Ok(Json(device))
}
