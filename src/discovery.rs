//! Logic for the `/.well-known/openid-configuration` endpoint.
//!
//! The issuer is whatever authority the client used to reach us, so the
//! document stays correct behind any hostname or alias.

use crate::{AppState, error::IdpError, jwks::JWKS_PATH};
use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Json,
};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    pub id_token_signing_alg_values_supported: Vec<Algorithm>,
    pub response_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
}

impl DiscoveryDocument {
    pub fn for_authority(authority: &str, algorithm: Algorithm) -> Self {
        let issuer = format!("https://{authority}");
        Self {
            jwks_uri: format!("{issuer}{JWKS_PATH}"),
            issuer,
            id_token_signing_alg_values_supported: vec![algorithm],
            response_types_supported: vec!["id_token".to_string()],
            subject_types_supported: vec!["public".to_string()],
        }
    }
}

/// Authority the request was addressed to.
///
/// `Host` first, then the URI authority (HTTP/2 sends `:authority` there).
/// With `trust_forwarded_host`, the first `X-Forwarded-Host` value wins.
pub fn request_authority(headers: &HeaderMap, uri: &Uri, trust_forwarded_host: bool) -> Option<String> {
    let header_value = |name: &'static str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
    };

    let forwarded = trust_forwarded_host
        .then(|| header_value(FORWARDED_HOST))
        .flatten()
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty());

    forwarded
        .or_else(|| header_value("host"))
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
}

/// Handler for the discovery endpoint.
#[tracing::instrument(skip_all)]
pub async fn openid_configuration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<DiscoveryDocument>, IdpError> {
    let authority = request_authority(&headers, &uri, state.settings.server.trust_forwarded_host)
        .ok_or(IdpError::MissingAuthority)?;

    tracing::debug!(authority = %authority, "serving discovery document");
    Ok(Json(DiscoveryDocument::for_authority(
        &authority,
        state.keys.algorithm(),
    )))
}
