// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Multi-method authentication: API key, then bearer JWT, then a trusted
//! mTLS fingerprint header, tried in that order — first success wins
//! (spec.md §9 redesign: an explicit middleware producing one immutable
//! `AuthContext`, not a per-handler decorator).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{core::Core, error::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
    Mtls,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub method: AuthMethod,
    pub principal: String,
    pub permissions: Vec<String>,
}

impl AuthContext {
    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.iter().any(|p| p == perm)
    }
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    user_id: String,
    #[serde(default)]
    permissions: Vec<String>,
    #[allow(dead_code)]
    exp: usize,
}

pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

fn authenticate_api_key(headers: &HeaderMap, core: &Core) -> Option<AuthContext> {
    let api_key = headers.get("x-api-key")?.to_str().ok()?;
    let hashed = hash_api_key(api_key);
    core.lookup_api_key_hash(&hashed).map(|owner| AuthContext {
        method: AuthMethod::ApiKey,
        principal: owner,
        permissions: vec!["read".into(), "write".into()],
    })
}

fn authenticate_jwt(headers: &HeaderMap, jwt_secret: &str) -> Option<AuthContext> {
    let header = headers.get("authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    Some(AuthContext {
        method: AuthMethod::Jwt,
        principal: data.claims.user_id,
        permissions: data.claims.permissions,
    })
}

fn authenticate_mtls(headers: &HeaderMap) -> Option<AuthContext> {
    let cert = headers.get("x-client-cert")?.to_str().ok()?;
    let fingerprint = hex::encode(Sha256::digest(cert.as_bytes()));
    Some(AuthContext {
        method: AuthMethod::Mtls,
        principal: fingerprint[..16].to_string(),
        permissions: vec!["read".into(), "write".into()],
    })
}

/// Tries each method in order; the auth context of the first one that
/// succeeds is returned.
pub fn authenticate_request(headers: &HeaderMap, core: &Core, jwt_secret: &str) -> Option<AuthContext> {
    authenticate_api_key(headers, core)
        .or_else(|| authenticate_jwt(headers, jwt_secret))
        .or_else(|| authenticate_mtls(headers))
}

/// axum middleware: rejects with 401 if no method authenticates, otherwise
/// injects `AuthContext` as a request extension for handlers to extract.
pub async fn require_auth(
    State(core): State<Arc<Core>>,
    mut request: Request,
    next: Next,
) -> Response {
    let jwt_secret = core.config.auth.jwt_secret.clone();
    match authenticate_request(request.headers(), &core, &jwt_secret) {
        Some(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        None => Error::Authentication("missing or invalid credentials".into()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn api_key_hash_is_deterministic() {
        assert_eq!(hash_api_key("secret"), hash_api_key("secret"));
        assert_ne!(hash_api_key("secret"), hash_api_key("other"));
    }

    #[test]
    fn mtls_fingerprint_is_first_sixteen_hex_chars() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-cert", HeaderValue::from_static("cert-bytes"));
        let ctx = authenticate_mtls(&headers).unwrap();
        assert_eq!(ctx.principal.len(), 16);
        assert_eq!(ctx.method, AuthMethod::Mtls);
    }

    #[test]
    fn no_credentials_means_no_auth_context() {
        let headers = HeaderMap::new();
        assert!(authenticate_jwt(&headers, "secret").is_none());
        assert!(authenticate_mtls(&headers).is_none());
    }
}
