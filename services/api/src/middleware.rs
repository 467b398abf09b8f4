//! Request gates and extractors
//!
//! Two independent gates guard the API. The token gate authenticates users
//! from a bearer header or cookie; the device gate admits kiosks by device
//! id and never looks at user credentials. No route carries both.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    async_trait,
    body::{Body, Bytes, to_bytes},
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use tracing::error;

use crate::{
    error::ApiError,
    models::{DeviceContext, Principal},
    services::{DeviceTrustError, RequestMeta},
    state::AppState,
};

/// Header naming the kiosk device
pub const DEVICE_ID_HEADER: &str = "x-device-id";
/// Header naming the kiosk's location
pub const LOCATION_ID_HEADER: &str = "x-location-id";

/// Kiosk payloads are small; anything larger is not a punch
const MAX_KIOSK_BODY_BYTES: usize = 64 * 1024;

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = state.verifier.resolve(req.headers())?;
    let principal = state.verifier.verify(&token)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Device trust middleware for kiosk routes
///
/// Identity comes from the `x-device-id` / `x-location-id` headers, falling
/// back to `deviceId` / `locationId` in a JSON body. The body is buffered and
/// handed on untouched.
pub async fn device_gate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_KIOSK_BODY_BYTES)
        .await
        .map_err(|_| ApiError::Validation("Request body too large".to_string()))?;

    let (device_id, location_id) = device_identity(&parts.headers, &bytes);
    let device: DeviceContext = state
        .devices
        .admit(device_id.as_deref(), location_id, Utc::now())
        .await?;

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(device);
    Ok(next.run(req).await)
}

fn device_identity(headers: &HeaderMap, body: &Bytes) -> (Option<String>, Option<i64>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut device_id = header(DEVICE_ID_HEADER);
    let mut location_id = header(LOCATION_ID_HEADER).and_then(|raw| raw.parse().ok());

    if device_id.is_none() || location_id.is_none() {
        if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
            if device_id.is_none() {
                device_id = fields.get("deviceId").and_then(|value| match value {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                });
            }
            if location_id.is_none() {
                location_id = fields.get("locationId").and_then(|value| match value {
                    Value::Number(number) => number.as_i64(),
                    Value::String(text) => text.trim().parse().ok(),
                    _ => None,
                });
            }
        }
    }

    (device_id, location_id)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            error!("Principal requested on a route without the token gate");
            ApiError::Unauthorized
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DeviceContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<DeviceContext>().cloned().ok_or_else(|| {
            error!("Device context requested on a route without the device gate");
            ApiError::Device(DeviceTrustError::MissingDeviceId)
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestMeta {
            method: Some(parts.method.to_string()),
            path: Some(parts.uri.path().to_string()),
            ip: client_ip(parts, state.trust_forwarded_for),
        })
    }
}

/// Client address for the audit trail. The peer address is used unless the
/// deployment trusts `x-forwarded-for`.
fn client_ip(parts: &Parts, trust_forwarded_for: bool) -> Option<String> {
    let forwarded = || {
        parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let peer = || {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    if trust_forwarded_for {
        forwarded().or_else(peer)
    } else {
        peer()
    }
}
