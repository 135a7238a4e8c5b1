use tracing::debug;

use crate::error::GatewayError;
use crate::security::audit_log::AuditLogger;
use crate::security::privileges::Privileges;
use crate::upstream::{Credential, PlatformClient, ScopedCredential};

/// Narrows an account credential to a single vehicle. One attempt, no retry,
/// and the result is never cached.
#[derive(Debug, Clone)]
pub struct PrivilegeExchanger {
    client: PlatformClient,
    privileges: Privileges,
    audit: AuditLogger,
}

impl PrivilegeExchanger {
    pub fn new(client: PlatformClient) -> Self {
        Self {
            client,
            privileges: Privileges::vehicle_read(),
            audit: AuditLogger::new(),
        }
    }

    pub fn privileges(&self) -> &Privileges {
        &self.privileges
    }

    pub async fn exchange(
        &self,
        credential: &Credential,
        vehicle_id: u64,
    ) -> Result<ScopedCredential, GatewayError> {
        debug!(vehicle_id, "exchanging account credential");
        match self
            .client
            .exchange(credential, vehicle_id, &self.privileges)
            .await
        {
            Ok(scoped) => {
                self.audit
                    .exchange_granted(vehicle_id, scoped.privileges().as_slice());
                Ok(scoped)
            }
            Err(err) => {
                self.audit.exchange_denied(vehicle_id, &err.to_string());
                Err(GatewayError::Exchange(err))
            }
        }
    }
}
