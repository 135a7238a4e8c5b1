use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::GatewayError;
use crate::security::audit_log::AuditLogger;

/// Token from an `Authorization: Bearer <token>` header.
///
/// Presence and prefix only; the token itself is not verified here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

pub fn parse_bearer(headers: &HeaderMap) -> Result<String, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("missing Authorization header")?;
    let value = value
        .to_str()
        .map_err(|_| "Authorization header is not valid ASCII")?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use the Bearer scheme")?
        .trim();
    if token.is_empty() {
        return Err("empty bearer token");
    }
    Ok(token.to_string())
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_bearer(&parts.headers).map(BearerToken).map_err(|reason| {
            AuditLogger::new().bearer_rejected(parts.uri.path(), reason);
            GatewayError::Unauthorized(reason)
        })
    }
}
