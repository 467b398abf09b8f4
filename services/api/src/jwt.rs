//! Bearer token verification
//!
//! Tokens are issued elsewhere and signed with a shared HS256 secret. This
//! module only resolves a token from the request and turns verified claims
//! into a [`Principal`].

use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{Principal, Role};

/// Cookie carrying the token when no `Authorization` header is sent
pub const DEFAULT_COOKIE_NAME: &str = "token";

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Name of the httpOnly cookie holding the token
    pub cookie_name: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub organization_id: i64,
    pub role: String,
    pub email: String,
    /// Expiration time
    pub exp: u64,
}

/// Why a request failed authentication
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Neither header nor cookie carried a token
    #[error("No token provided")]
    Missing,

    /// Signature verified but the payload is not a usable claim set
    #[error("Invalid token payload")]
    InvalidPayload,

    #[error("Token expired or invalid")]
    ExpiredOrInvalid,
}

/// Verifies tokens against the shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Validate a token and build the caller identity from its claims
    pub fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                debug!("Failed to validate token: {}", e);
                match e.kind() {
                    ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                        TokenError::InvalidPayload
                    }
                    _ => TokenError::ExpiredOrInvalid,
                }
            })?;

        let claims = token_data.claims;
        let role = claims.role.parse::<Role>().map_err(|e| {
            debug!("Rejected token claims: {}", e);
            TokenError::InvalidPayload
        })?;

        Ok(Principal {
            user_id: claims.user_id,
            organization_id: claims.organization_id,
            role,
            email: claims.email,
        })
    }

    /// Token from the request, header first
    pub fn resolve(&self, headers: &HeaderMap) -> Result<String, TokenError> {
        extract_token(headers, &self.cookie_name).ok_or(TokenError::Missing)
    }
}

/// `Authorization: Bearer` wins over the cookie even when both are present.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}
