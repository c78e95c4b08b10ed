//! Logic for the `/certs` endpoint.
//!
//! Serves the JSON Web Key Set (JWKS) containing the single public key used
//! to verify tokens signed by this identity provider.

use crate::AppState;
use axum::{extract::State, http::header, response::IntoResponse};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Path the JWKS handler is mounted on. The discovery document's
/// `jwks_uri` is built from this same constant.
pub const JWKS_PATH: &str = "/certs";

/// A JSON Web Key Set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn single(jwk: Jwk) -> Self {
        Self { keys: vec![jwk] }
    }
}

/// A JSON Web Key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA" here.
    pub kty: String,
    /// Key ID.
    pub kid: String,
    /// Key use, always "sig" here.
    #[serde(rename = "use")]
    pub key_use: String,
    /// Algorithm the key signs with.
    pub alg: Algorithm,
    /// Modulus (Base64URL encoded).
    pub n: String,
    /// Exponent (Base64URL encoded).
    pub e: String,
}

/// Handler for the `/certs` endpoint.
///
/// Returns the JWKS JSON computed once when the key was loaded.
pub async fn certs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.keys.jwks_json().to_owned(),
    )
}
