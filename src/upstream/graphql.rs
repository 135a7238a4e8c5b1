//! Queries issued against the identity and telemetry GraphQL services.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::UpstreamError;

/// Page size for vehicle listings.
pub const VEHICLE_PAGE_SIZE: u32 = 100;

/// Aggregation bucket for telemetry summaries.
pub const DAILY_INTERVAL: &str = "24h";

const PRIVILEGED_VEHICLES: &str = r#"query PrivilegedVehicles($privileged: Address!, $first: Int!) {
  vehicles(filterBy: { privileged: $privileged }, first: $first) {
    totalCount
    nodes {
      tokenId
      owner
      mintedAt
      definition { make model year }
      aftermarketDevice { tokenId serial }
    }
  }
}"#;

const DAILY_SIGNALS: &str = r#"query DailySignals($tokenId: Int!, $interval: String!, $from: Time!, $to: Time!) {
  signals(tokenId: $tokenId, interval: $interval, from: $from, to: $to) {
    timestamp
    maxFuelLevel: powertrainFuelSystemRelativeLevel(agg: MAX)
    avgFuelLevel: powertrainFuelSystemRelativeLevel(agg: AVG)
    maxSpeed: speed(agg: MAX)
    avgSpeed: speed(agg: AVG)
  }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    pub query: &'static str,
    pub variables: Value,
}

/// Vehicles the client has been granted privileges on.
pub fn privileged_vehicles(client_id: &str) -> GraphQlRequest {
    GraphQlRequest {
        query: PRIVILEGED_VEHICLES,
        variables: json!({
            "privileged": client_id,
            "first": VEHICLE_PAGE_SIZE,
        }),
    }
}

/// Per-day max/avg fuel level and speed between `from` and `to`, passed through verbatim.
pub fn daily_signals(vehicle_id: u64, from: &str, to: &str) -> GraphQlRequest {
    GraphQlRequest {
        query: DAILY_SIGNALS,
        variables: json!({
            "tokenId": vehicle_id,
            "interval": DAILY_INTERVAL,
            "from": from,
            "to": to,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrors {
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

/// Rejects payloads carrying a non-empty `errors` array; passes the rest through.
pub fn check_response(payload: Value) -> Result<Value, UpstreamError> {
    let GraphQlErrors { errors } = serde_json::from_value(payload.clone())
        .map_err(|e| UpstreamError::Decode(e.to_string()))?;
    match errors.unwrap_or_default().into_iter().next() {
        Some(first) => Err(UpstreamError::GraphQl(first.message)),
        None => Ok(payload),
    }
}
