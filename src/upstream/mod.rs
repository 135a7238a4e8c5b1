pub mod client;
pub mod graphql;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::security::privileges::Privileges;

pub use client::PlatformClient;

const AUTHORIZATION: &str = "Authorization";

/// Opaque bearer object returned by the identity provider.
///
/// Serialized as `{"headers": {"Authorization": "Bearer <jwt>"}}`, the shape the
/// platform SDKs hand to callers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub headers: BTreeMap<String, String>,
}

impl Credential {
    pub fn bearer(token: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(AUTHORIZATION.to_string(), format!("Bearer {token}"));
        Self { headers }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).map(String::as_str)
    }

    /// Raw token without the `Bearer ` prefix.
    pub fn token(&self) -> Option<&str> {
        self.authorization()
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
    }

    pub(crate) fn apply(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("Credential").field("headers", &names).finish()
    }
}

/// Credential narrowed to one vehicle. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedCredential {
    credential: Credential,
    vehicle_id: u64,
    privileges: Privileges,
}

impl ScopedCredential {
    pub fn new(credential: Credential, vehicle_id: u64, privileges: Privileges) -> Self {
        Self {
            credential,
            vehicle_id,
            privileges,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn vehicle_id(&self) -> u64 {
        self.vehicle_id
    }

    pub fn privileges(&self) -> &Privileges {
        &self.privileges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_credential_shape() {
        let cred = Credential::bearer("jwt-1");
        assert_eq!(cred.authorization(), Some("Bearer jwt-1"));
        assert_eq!(cred.token(), Some("jwt-1"));
        assert_eq!(
            serde_json::to_value(&cred).unwrap(),
            serde_json::json!({"headers": {"Authorization": "Bearer jwt-1"}})
        );
    }

    #[test]
    fn debug_hides_header_values() {
        let rendered = format!("{:?}", Credential::bearer("secret-jwt"));
        assert!(!rendered.contains("secret-jwt"));
        assert!(rendered.contains("Authorization"));
    }
}
