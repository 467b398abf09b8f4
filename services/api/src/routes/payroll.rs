//! Payroll period handlers

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::ApiResult,
    models::{GenerateQuery, GenerateResponse, LockedQuery, PeriodQuery, Principal},
    services::{GenerationWindow, RequestMeta},
    state::AppState,
};

pub async fn generate_periods(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    query: Result<Query<GenerateQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let window = GenerationWindow::new(
        query.months_ahead,
        query.months_back,
        state.generation_window,
    )?;

    let created_count = state
        .payroll
        .generate_for(&principal, Utc::now().date_naive(), window, meta)
        .await?;

    Ok(Json(GenerateResponse { created_count }))
}

pub async fn approve_period(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let period = state
        .payroll
        .approve(&principal, id, Utc::now(), meta)
        .await?;

    Ok(Json(period))
}

pub async fn lock_period(
    State(state): State<AppState>,
    principal: Principal,
    meta: RequestMeta,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let period = state.payroll.lock(&principal, id, meta).await?;

    Ok(Json(period))
}

/// Period containing `date` (default today) for a location
pub async fn current_period(
    State(state): State<AppState>,
    principal: Principal,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let range = state
        .payroll
        .current_period(&principal, query.location_id, date)
        .await?;

    Ok(Json(range))
}

pub async fn locked_status(
    State(state): State<AppState>,
    principal: Principal,
    query: Result<Query<LockedQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let locked = state
        .payroll
        .is_date_locked(principal.organization_id, query.location_id, query.date)
        .await?;

    Ok(Json(json!({ "locked": locked })))
}
