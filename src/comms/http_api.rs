use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::{ClientIdentity, Config};
use crate::error::{GatewayError, UpstreamError};
use crate::security::authenticator::Authenticator;
use crate::security::bearer::BearerToken;
use crate::security::credential_cache::CredentialCache;
use crate::security::exchange::PrivilegeExchanger;
use crate::upstream::graphql;
use crate::upstream::{Credential, PlatformClient, ScopedCredential};

pub type SharedState = Arc<AppState>;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: PlatformClient,
    pub authenticator: Authenticator,
    pub exchanger: PrivilegeExchanger,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let client = PlatformClient::from_config(&config)?;
        let cache = CredentialCache::new(config.credential_ttl);
        let authenticator = Authenticator::new(client.clone(), config.identity.clone(), cache);
        let exchanger = PrivilegeExchanger::new(client.clone());
        Ok(Self {
            config: Arc::new(config),
            client,
            authenticator,
            exchanger,
        })
    }
}

/// Account-level credential resolved (and refreshed if needed) for this request.
#[derive(Debug, Clone)]
pub struct AccountCredential(pub Credential);

impl FromRequestParts<SharedState> for AccountCredential {
    type Rejection = GatewayError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        state.authenticator.credential().await.map(AccountCredential)
    }
}

/// Vehicle-scoped credential for the `{id}` path segment.
///
/// The id is validated before any upstream call is made.
#[derive(Debug, Clone)]
pub struct VehicleCredential(pub ScopedCredential);

pub fn parse_vehicle_id(raw: &str) -> Result<u64, GatewayError> {
    raw.parse::<u64>()
        .map_err(|_| GatewayError::InvalidVehicleId(raw.to_string()))
}

impl FromRequestParts<SharedState> for VehicleCredential {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| GatewayError::BadRequest(e.body_text()))?;
        let vehicle_id = parse_vehicle_id(&raw)?;
        debug!(vehicle_id, "resolving vehicle credential");

        let account = state.authenticator.credential().await?;
        let scoped = state.exchanger.exchange(&account, vehicle_id).await?;
        Ok(VehicleCredential(scoped))
    }
}

/// Time window for telemetry summaries; both bounds required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalsWindow {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
struct SignalsQuery {
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    #[serde(rename = "endTime")]
    end_time: Option<String>,
}

impl<S> FromRequestParts<S> for SignalsWindow
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<SignalsQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| GatewayError::BadRequest(e.body_text()))?;
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let start_time =
            non_empty(query.start_time).ok_or(GatewayError::MissingParameter("startTime"))?;
        let end_time =
            non_empty(query.end_time).ok_or(GatewayError::MissingParameter("endTime"))?;
        Ok(Self {
            start_time,
            end_time,
        })
    }
}

#[derive(Deserialize)]
pub struct AuthRequest {
    pub client_id: String,
    pub domain: String,
    pub private_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeBody {
    #[serde(rename = "tokenId", alias = "vehicleId")]
    pub token_id: u64,
}

fn upstream_failure(context: &'static str) -> impl FnOnce(UpstreamError) -> GatewayError {
    move |err| GatewayError::upstream(context, err)
}

// Health check
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn auth_token(AccountCredential(credential): AccountCredential) -> Json<Credential> {
    Json(credential)
}

async fn user(
    State(state): State<SharedState>,
    AccountCredential(credential): AccountCredential,
) -> Result<Json<Value>, GatewayError> {
    state
        .client
        .user(&credential)
        .await
        .map(Json)
        .map_err(upstream_failure("Failed to get user"))
}

async fn device_makes(
    State(state): State<SharedState>,
    AccountCredential(credential): AccountCredential,
) -> Result<Json<Value>, GatewayError> {
    state
        .client
        .device_makes(&credential)
        .await
        .map(Json)
        .map_err(upstream_failure("Failed to list device makes"))
}

async fn vehicles(
    State(state): State<SharedState>,
    AccountCredential(credential): AccountCredential,
) -> Result<Json<Value>, GatewayError> {
    let query = graphql::privileged_vehicles(&state.config.identity.client_id);
    state
        .client
        .identity_query(&credential, &query)
        .await
        .map(Json)
        .map_err(upstream_failure("Failed to list vehicles"))
}

async fn vehicle_status(
    State(state): State<SharedState>,
    VehicleCredential(scoped): VehicleCredential,
) -> Result<Json<Value>, GatewayError> {
    state
        .client
        .vehicle_status(&scoped)
        .await
        .map(Json)
        .map_err(upstream_failure("Error getting vehicle status"))
}

async fn vehicle_trips(
    State(state): State<SharedState>,
    VehicleCredential(scoped): VehicleCredential,
) -> Result<Json<Value>, GatewayError> {
    state
        .client
        .trips(&scoped)
        .await
        .map(Json)
        .map_err(upstream_failure("Error getting vehicle trips"))
}

async fn vehicle_info(
    State(state): State<SharedState>,
    window: SignalsWindow,
    VehicleCredential(scoped): VehicleCredential,
) -> Result<Json<Value>, GatewayError> {
    let query = graphql::daily_signals(scoped.vehicle_id(), &window.start_time, &window.end_time);
    state
        .client
        .telemetry_query(&scoped, &query)
        .await
        .map(Json)
        .map_err(upstream_failure("Error getting vehicle info"))
}

// Bootstrap handshake with caller-supplied identity; result is not cached
async fn auth_handshake(
    State(state): State<SharedState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, GatewayError> {
    let Json(req) = payload.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let identity = ClientIdentity::new(req.client_id, req.domain, req.private_key);

    let access_token = state
        .client
        .access_token(&identity)
        .await
        .map_err(GatewayError::Handshake)?;
    info!(client_id = %identity.client_id, "handshake completed");
    Ok(Json(AuthResponse { access_token }))
}

async fn exchange(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    payload: Result<Json<ExchangeBody>, JsonRejection>,
) -> Result<Json<Credential>, GatewayError> {
    let Json(body) = payload.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let scoped = state
        .exchanger
        .exchange(&Credential::bearer(&token), body.token_id)
        .await?;
    Ok(Json(scoped.credential().clone()))
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/authToken", get(auth_token))
        .route("/user", get(user))
        .route("/deviceMakes", get(device_makes))
        .route("/vehicles", get(vehicles))
        .route("/vehicle/{id}", get(vehicle_status))
        .route("/vehicle/{id}/trips", get(vehicle_trips))
        .route("/vehicle/{id}/info", get(vehicle_info))
        .route("/auth", post(auth_handshake))
        .route("/exchange", post(exchange))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("shutdown signal received");
}

pub async fn serve(config: Config, port: u16) -> Result<()> {
    info!(
        version = crate::VERSION,
        environment = ?config.environment,
        ttl_secs = config.credential_ttl.as_secs(),
        "starting vehicle gateway"
    );
    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_id_must_be_unsigned_integer() {
        assert_eq!(parse_vehicle_id("42").unwrap(), 42);
        assert!(matches!(
            parse_vehicle_id("abc"),
            Err(GatewayError::InvalidVehicleId(raw)) if raw == "abc"
        ));
        assert!(parse_vehicle_id("-1").is_err());
        assert!(parse_vehicle_id("4.2").is_err());
        assert!(parse_vehicle_id("").is_err());
    }
}
