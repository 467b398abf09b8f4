//! API service routes
//!
//! Kiosk routes sit behind the device gate, everything else behind the token
//! gate. The two sub-routers never share a route.

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::{
    middleware::{auth_middleware, device_gate},
    state::AppState,
};

mod audit;
mod devices;
mod payroll;
mod punches;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let kiosk_routes = Router::new()
        .route("/punches/add", post(punches::create_punch))
        .route_layer(middleware::from_fn_with_state(state.clone(), device_gate));

    let protected_routes = Router::new()
        .route("/punches/stream", get(punches::stream_punches))
        .route("/punches/:id", delete(punches::delete_punch))
        .route(
            "/supervisor/punch/:id",
            put(punches::supervisor_edit).delete(punches::supervisor_delete),
        )
        .route("/supervisor/shift", post(punches::supervisor_shift))
        .route("/payperiod/generate", post(payroll::generate_periods))
        .route("/payperiod/current", get(payroll::current_period))
        .route("/payperiod/locked", get(payroll::locked_status))
        .route("/payperiod/:id/approve", post(payroll::approve_period))
        .route("/payperiod/:id/lock", post(payroll::lock_period))
        .route("/devices/:id/approve", post(devices::approve_device))
        .route("/devices/:id/deactivate", post(devices::deactivate_device))
        .route(
            "/audit-logs",
            get(audit::list_audit_logs).post(audit::create_audit_log),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(kiosk_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "timeclock-api"
    }))
}
