//! Custom error types for the API service

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    jwt::TokenError,
    services::{DeviceTrustError, ServiceError},
};

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No credential presented
    #[error("Unauthorized")]
    Unauthorized,

    /// Verified token whose payload is unusable
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired or invalid")]
    ExpiredOrInvalid,

    #[error("Forbidden")]
    Forbidden,

    /// Bad request with message
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Kiosk rejected by the device gate
    #[error("{0}")]
    Device(DeviceTrustError),

    #[error("Payroll period is locked")]
    PeriodLocked,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidToken | ApiError::ExpiredOrInvalid => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Device(
                DeviceTrustError::MissingDeviceId | DeviceTrustError::MissingLocation,
            ) => StatusCode::BAD_REQUEST,
            ApiError::Device(_) => StatusCode::FORBIDDEN,
            ApiError::PeriodLocked => StatusCode::CONFLICT,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::ExpiredOrInvalid => "TOKEN_EXPIRED_OR_INVALID",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Device(e) => e.code(),
            ApiError::PeriodLocked => "PERIOD_LOCKED",
            ApiError::InternalServerError => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ServiceError::Forbidden => ApiError::Forbidden,
            ServiceError::Device(e) => ApiError::Device(e),
            ServiceError::PeriodLocked(_) => ApiError::PeriodLocked,
            ServiceError::Audit(e) => {
                error!("Request failed on audit write: {}", e);
                ApiError::InternalServerError
            }
            ServiceError::Database(e) => {
                error!("Database error: {}", e);
                ApiError::InternalServerError
            }
            ServiceError::PayPeriod(e) => {
                error!("Pay period configuration error: {}", e);
                ApiError::InternalServerError
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Missing => ApiError::Unauthorized,
            TokenError::InvalidPayload => ApiError::InvalidToken,
            TokenError::ExpiredOrInvalid => ApiError::ExpiredOrInvalid,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::error::DatabaseError;

    #[test]
    fn test_device_errors_keep_their_codes() {
        let err = ApiError::from(ServiceError::Device(DeviceTrustError::NotApproved));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "DEVICE_NOT_APPROVED");

        let err = ApiError::from(ServiceError::Device(DeviceTrustError::MissingLocation));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MISSING_LOCATION");
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = ApiError::from(ServiceError::Database(DatabaseError::Configuration(
            "secret detail".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_locked_period_is_conflict() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let err = ApiError::from(ServiceError::PeriodLocked(date));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "PERIOD_LOCKED");
    }

    #[test]
    fn test_token_errors() {
        assert_eq!(ApiError::from(TokenError::Missing).code(), "UNAUTHORIZED");
        assert_eq!(ApiError::from(TokenError::InvalidPayload).code(), "INVALID_TOKEN");
        assert_eq!(
            ApiError::from(TokenError::ExpiredOrInvalid).code(),
            "TOKEN_EXPIRED_OR_INVALID"
        );
    }
}
