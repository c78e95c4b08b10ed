//! Logic for the `/token` endpoint.
//!
//! Signs whatever JSON object it is given. There is no caller
//! authentication and no check on the claims themselves, so anything that
//! relies on these tokens for real access decisions has to put its own
//! authorization in front of this route.

use crate::{AppState, audit, error::IdpError, key::KeyMaterial};
use axum::{
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::header,
    response::IntoResponse,
};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const TOKEN_PATH: &str = "/token";

/// Parses `body` as a claim set and signs it with the active key.
///
/// # Errors
/// [`IdpError::MalformedClaims`] if the body is not a JSON object,
/// [`IdpError::Signing`] if the signature cannot be produced.
pub fn issue_token(keys: &KeyMaterial, body: &[u8]) -> Result<String, IdpError> {
    let claims: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| IdpError::MalformedClaims(e.to_string()))?;

    let token = keys.sign(&claims)?;

    // names only, claim values may be sensitive
    let claim_names: Vec<&str> = claims.keys().map(String::as_str).collect();
    audit!(kid = %keys.kid(), claims = ?claim_names, "issued token");
    Ok(token)
}

/// Handler for `POST /token`. Responds with the compact token as plain text.
#[tracing::instrument(skip_all)]
pub async fn token(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, IdpError> {
    let body = body.map_err(|e| IdpError::BodyUnreadable {
        status: e.status(),
        reason: e.body_text(),
    })?;
    let token = issue_token(&state.keys, &body)?;

    Ok(([(header::CONTENT_TYPE, "text/plain")], token))
}
