//! Request header helpers.

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::error::{GoalcastError, Result};

/// Pull the bearer token out of the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GoalcastError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GoalcastError::unauthorized("Expected a bearer token"))
}

/// Require a matching `x-admin-key` header.
///
/// Compared in constant time; a missing or wrong key reads the same from
/// the response timing.
pub fn require_admin_key(headers: &HeaderMap, expected: &SecretString) -> Result<()> {
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let matches = provided
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .unwrap_u8()
        == 1;

    if matches {
        Ok(())
    } else {
        Err(GoalcastError::unauthorized("Invalid admin key"))
    }
}
