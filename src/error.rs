//! Error taxonomy for the gateway.
//!
//! [`UpstreamError`] describes what went wrong talking to the vehicle-data
//! platform. [`GatewayError`] classifies the failure from the point of view of
//! an HTTP caller and renders the `{error, details}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Failure of a single upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS or timeout failure
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; the message is the raw upstream body
    #[error("{message}")]
    Status { status: u16, message: String },

    /// 2xx response whose body could not be decoded
    #[error("malformed upstream response: {0}")]
    Decode(String),

    /// GraphQL response carrying an `errors` array
    #[error("{0}")]
    GraphQl(String),

    /// The configured private key could not sign the challenge
    #[error("signing failed: {0}")]
    Signing(String),
}

impl UpstreamError {
    pub fn status(status: u16, body: String) -> Self {
        let message = if body.trim().is_empty() {
            format!("upstream returned status {status}")
        } else {
            body
        };
        Self::Status { status, message }
    }
}

/// Handler-level failure, converted into an HTTP response.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Account-level credential could not be obtained
    #[error("Unable to authenticate")]
    Authentication(#[source] UpstreamError),

    /// Vehicle-scoped privilege exchange was rejected or failed
    #[error("Error during token exchange")]
    Exchange(#[source] UpstreamError),

    /// A proxied data call failed
    #[error("{context}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// Bootstrap challenge/sign/submit handshake failed
    #[error("Authentication handshake failed")]
    Handshake(#[source] UpstreamError),

    #[error("Invalid vehicle id")]
    InvalidVehicleId(String),

    #[error("Missing query parameter")]
    MissingParameter(&'static str),

    #[error("Unauthorized")]
    Unauthorized(&'static str),

    #[error("Bad request")]
    BadRequest(String),
}

impl GatewayError {
    pub fn upstream(context: &'static str, source: UpstreamError) -> Self {
        Self::Upstream { context, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) | Self::Exchange(_) | Self::Upstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Handshake(_)
            | Self::InvalidVehicleId(_)
            | Self::MissingParameter(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Human readable detail; for upstream failures this is the upstream message.
    pub fn details(&self) -> String {
        match self {
            Self::Authentication(e) | Self::Exchange(e) | Self::Handshake(e) => e.to_string(),
            Self::Upstream { source, .. } => source.to_string(),
            Self::InvalidVehicleId(raw) => {
                format!("vehicle id must be an unsigned integer, got {raw:?}")
            }
            Self::MissingParameter(name) => format!("{name} is required"),
            Self::Unauthorized(reason) => (*reason).to_string(),
            Self::BadRequest(reason) => reason.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            details: self.details(),
        };
        warn!(status = status.as_u16(), error = %body.error, details = %body.details, "request failed");
        (status, Json(body)).into_response()
    }
}
