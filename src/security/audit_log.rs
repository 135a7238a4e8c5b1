use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn credential_refreshed(&self, client_id: &str, expires_at: &str) {
        info!(target: "audit", event = "credential_refreshed", client_id, expires_at);
    }

    pub fn auth_failure(&self, client_id: &str, reason: &str) {
        warn!(target: "audit", event = "auth_failure", client_id, reason);
    }

    pub fn exchange_granted(&self, vehicle_id: u64, privileges: &[u32]) {
        info!(target: "audit", event = "exchange_granted", vehicle_id, privileges = ?privileges);
    }

    pub fn exchange_denied(&self, vehicle_id: u64, reason: &str) {
        warn!(target: "audit", event = "exchange_denied", vehicle_id, reason);
    }

    pub fn bearer_rejected(&self, path: &str, reason: &str) {
        warn!(target: "audit", event = "bearer_rejected", path, reason);
    }
}
