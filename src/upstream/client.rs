use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{ClientIdentity, Config, Endpoints};
use crate::error::UpstreamError;
use crate::security::privileges::Privileges;
use crate::security::signer::ChallengeSigner;
use crate::upstream::graphql::{self, GraphQlRequest};
use crate::upstream::{Credential, ScopedCredential};

const CHALLENGE_SCOPE: &str = "openid email";
const CHALLENGE_RESPONSE_TYPE: &str = "code";
const SUBMIT_GRANT_TYPE: &str = "authorization_code";

#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    pub state: String,
    pub challenge: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExchangeResponse {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    nft_contract_address: &'a str,
    privileges: &'a [u32],
    token_id: u64,
}

/// HTTP client for every vehicle-data platform service the gateway proxies.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    endpoints: Arc<Endpoints>,
    nft_contract_address: Arc<str>,
}

impl PlatformClient {
    pub fn new(
        endpoints: Endpoints,
        nft_contract_address: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
            nft_contract_address: Arc::from(nft_contract_address),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        Self::new(
            config.endpoints.clone(),
            &config.nft_contract_address,
            config.upstream_timeout,
        )
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<Value, UpstreamError> {
        let resp = req.header(ACCEPT, "application/json").send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "upstream call rejected");
            return Err(UpstreamError::status(status.as_u16(), body));
        }

        trace!(status = status.as_u16(), bytes = body.len(), "upstream call succeeded");
        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn send_typed<T: for<'de> Deserialize<'de>>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let value = self.send_json(req).await?;
        serde_json::from_value(value).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    /// Step 1 of the handshake: ask the identity provider for a challenge.
    pub async fn generate_challenge(
        &self,
        client_id: &str,
        domain: &str,
    ) -> Result<Challenge, UpstreamError> {
        let url = format!("{}/auth/web3/generate_challenge", self.endpoints.auth);
        debug!(url = %url, client_id = %client_id, "requesting auth challenge");
        let req = self.http.post(&url).query(&[
            ("client_id", client_id),
            ("domain", domain),
            ("scope", CHALLENGE_SCOPE),
            ("response_type", CHALLENGE_RESPONSE_TYPE),
            ("address", client_id),
        ]);
        self.send_typed(req).await
    }

    /// Step 3 of the handshake: submit the signed challenge for an access token.
    pub async fn submit_challenge(
        &self,
        client_id: &str,
        domain: &str,
        state: &str,
        signature: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/auth/web3/submit_challenge", self.endpoints.auth);
        debug!(url = %url, client_id = %client_id, "submitting signed challenge");
        let req = self.http.post(&url).form(&[
            ("client_id", client_id),
            ("domain", domain),
            ("state", state),
            ("signature", signature),
            ("grant_type", SUBMIT_GRANT_TYPE),
        ]);
        let resp: AccessTokenResponse = self.send_typed(req).await?;
        Ok(resp.access_token)
    }

    /// Full challenge → sign → submit handshake. Returns the raw access token.
    pub async fn access_token(&self, identity: &ClientIdentity) -> Result<String, UpstreamError> {
        // Parse the key before any network traffic.
        let signer = ChallengeSigner::from_hex(&identity.private_key)?;
        let challenge = self
            .generate_challenge(&identity.client_id, &identity.domain)
            .await?;
        debug!(signer = %signer.address(), "signing auth challenge");
        let signature = signer.sign_personal_message(&challenge.challenge)?;
        self.submit_challenge(
            &identity.client_id,
            &identity.domain,
            &challenge.state,
            &signature,
        )
        .await
    }

    /// Account-level credential for the given identity.
    pub async fn get_token(&self, identity: &ClientIdentity) -> Result<Credential, UpstreamError> {
        let token = self.access_token(identity).await?;
        Ok(Credential::bearer(&token))
    }

    /// Exchange an account credential for one scoped to `vehicle_id`.
    pub async fn exchange(
        &self,
        credential: &Credential,
        vehicle_id: u64,
        privileges: &Privileges,
    ) -> Result<ScopedCredential, UpstreamError> {
        let url = format!("{}/v1/tokens/exchange", self.endpoints.token_exchange);
        debug!(url = %url, vehicle_id, privileges = ?privileges.as_slice(), "exchanging credential");
        let body = ExchangeRequest {
            nft_contract_address: &self.nft_contract_address,
            privileges: privileges.as_slice(),
            token_id: vehicle_id,
        };
        let req = credential.apply(self.http.post(&url)).json(&body);
        let resp: ExchangeResponse = self.send_typed(req).await?;
        Ok(ScopedCredential::new(
            Credential::bearer(&resp.token),
            vehicle_id,
            privileges.clone(),
        ))
    }

    pub async fn user(&self, credential: &Credential) -> Result<Value, UpstreamError> {
        let url = format!("{}/v1/user", self.endpoints.users);
        self.send_json(credential.apply(self.http.get(&url))).await
    }

    pub async fn device_makes(&self, credential: &Credential) -> Result<Value, UpstreamError> {
        let url = format!("{}/device-makes", self.endpoints.device_definitions);
        self.send_json(credential.apply(self.http.get(&url))).await
    }

    pub async fn vehicle_status(&self, scoped: &ScopedCredential) -> Result<Value, UpstreamError> {
        let url = format!(
            "{}/v1/vehicle/{}/status",
            self.endpoints.device_data,
            scoped.vehicle_id()
        );
        self.send_json(scoped.credential().apply(self.http.get(&url)))
            .await
    }

    pub async fn trips(&self, scoped: &ScopedCredential) -> Result<Value, UpstreamError> {
        let url = format!(
            "{}/v1/vehicle/{}/trips",
            self.endpoints.trips,
            scoped.vehicle_id()
        );
        self.send_json(scoped.credential().apply(self.http.get(&url)))
            .await
    }

    async fn graphql(
        &self,
        url: &str,
        credential: &Credential,
        request: &GraphQlRequest,
    ) -> Result<Value, UpstreamError> {
        trace!(url = %url, variables = %request.variables, "sending GraphQL query");
        let req = credential.apply(self.http.post(url)).json(request);
        graphql::check_response(self.send_json(req).await?)
    }

    pub async fn identity_query(
        &self,
        credential: &Credential,
        request: &GraphQlRequest,
    ) -> Result<Value, UpstreamError> {
        self.graphql(&self.endpoints.identity, credential, request)
            .await
    }

    pub async fn telemetry_query(
        &self,
        scoped: &ScopedCredential,
        request: &GraphQlRequest,
    ) -> Result<Value, UpstreamError> {
        self.graphql(&self.endpoints.telemetry, scoped.credential(), request)
            .await
    }
}
