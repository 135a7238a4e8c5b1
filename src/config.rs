use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed credential lifetime; not derived from the issued token.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

const PRODUCTION_VEHICLE_CONTRACT: &str = "0xbA5738a18d83D41847dfFbDC6101d37C69c9B0cF";
const DEV_VEHICLE_CONTRACT: &str = "0x45fbCD3ef7361d156e8b16F5538AE36DEdf61Da8";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Production,
    Dev,
}

impl Environment {
    fn host_suffix(self) -> &'static str {
        match self {
            Environment::Production => "dimo.zone",
            Environment::Dev => "dev.dimo.zone",
        }
    }

    pub fn vehicle_contract(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_VEHICLE_CONTRACT,
            Environment::Dev => DEV_VEHICLE_CONTRACT,
        }
    }
}

/// Base URLs of every upstream service the gateway talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub auth: String,
    pub token_exchange: String,
    pub users: String,
    pub device_definitions: String,
    pub device_data: String,
    pub trips: String,
    /// Full GraphQL URL, not a base
    pub identity: String,
    /// Full GraphQL URL, not a base
    pub telemetry: String,
}

impl Endpoints {
    pub fn for_environment(env: Environment) -> Self {
        let host = env.host_suffix();
        Self {
            auth: format!("https://auth.{host}"),
            token_exchange: format!("https://token-exchange-api.{host}"),
            users: format!("https://users-api.{host}"),
            device_definitions: format!("https://device-definitions-api.{host}"),
            device_data: format!("https://device-data-api.{host}"),
            trips: format!("https://trips-api.{host}"),
            identity: format!("https://identity-api.{host}/query"),
            telemetry: format!("https://telemetry-api.{host}/query"),
        }
    }

    /// Routes every service through a single base URL, e.g. a local proxy.
    /// The GraphQL services are mounted at `/identity/query` and `/telemetry/query`.
    pub fn uniform(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth: base.to_string(),
            token_exchange: base.to_string(),
            users: base.to_string(),
            device_definitions: base.to_string(),
            device_data: base.to_string(),
            trips: base.to_string(),
            identity: format!("{base}/identity/query"),
            telemetry: format!("{base}/telemetry/query"),
        }
    }

    fn apply(&mut self, overrides: EndpointOverrides) {
        let EndpointOverrides {
            auth,
            token_exchange,
            users,
            device_definitions,
            device_data,
            trips,
            identity,
            telemetry,
        } = overrides;
        let pairs = [
            (&mut self.auth, auth),
            (&mut self.token_exchange, token_exchange),
            (&mut self.users, users),
            (&mut self.device_definitions, device_definitions),
            (&mut self.device_data, device_data),
            (&mut self.trips, trips),
            (&mut self.identity, identity),
            (&mut self.telemetry, telemetry),
        ];
        for (slot, value) in pairs {
            if let Some(v) = value {
                *slot = v.trim_end_matches('/').to_string();
            }
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Client identity registered with the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    /// Redirect URI registered for the client; sent as `domain`
    pub domain: String,
    pub private_key: String,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("domain", &self.domain)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ClientIdentity {
    pub fn new(
        client_id: impl Into<String>,
        domain: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            domain: domain.into(),
            private_key: private_key.into(),
        }
    }

    /// Read the identity from process environment.
    ///
    /// Accepts `CLIENT_ID`, `REDIRECT_URI`, `PRIVATE_KEY` or their lowercase forms.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&name.to_ascii_lowercase()))
                .filter(|v| !v.trim().is_empty())
        };

        let client_id = read("CLIENT_ID");
        let domain = read("REDIRECT_URI");
        let private_key = read("PRIVATE_KEY");

        match (client_id, domain, private_key) {
            (Some(client_id), Some(domain), Some(private_key)) => Ok(Self {
                client_id,
                domain,
                private_key,
            }),
            (client_id, domain, private_key) => {
                let missing: Vec<&str> = [
                    ("CLIENT_ID", client_id.is_none()),
                    ("REDIRECT_URI", domain.is_none()),
                    ("PRIVATE_KEY", private_key.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                bail!("missing environment variables: {}", missing.join(", "))
            }
        }
    }
}

/// Loads a dotenv file into the process environment.
///
/// Runs before logging starts so `RUST_LOG` and `LOG_FORMAT` can live there too.
/// A missing file is `Ok(None)`; a malformed one is an error.
pub fn load_env_file(path: &str) -> Result<Option<PathBuf>> {
    match dotenvy::from_filename(path) {
        Ok(loaded) => Ok(Some(loaded)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context("loading env file"),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointOverrides {
    auth: Option<String>,
    token_exchange: Option<String>,
    users: Option<String>,
    device_definitions: Option<String>,
    device_data: Option<String>,
    trips: Option<String>,
    identity: Option<String>,
    telemetry: Option<String>,
}

/// On-disk shape of the optional JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    environment: Option<Environment>,
    #[serde(default)]
    endpoints: EndpointOverrides,
    credential_ttl_secs: Option<u64>,
    upstream_timeout_secs: Option<u64>,
    nft_contract_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity: ClientIdentity,
    pub environment: Environment,
    pub endpoints: Endpoints,
    pub credential_ttl: Duration,
    pub upstream_timeout: Duration,
    /// Vehicle NFT contract the privilege exchange is issued against
    pub nft_contract_address: String,
}

impl Config {
    /// Production defaults for the given identity.
    pub fn new(identity: ClientIdentity) -> Self {
        let environment = Environment::default();
        Self {
            identity,
            environment,
            endpoints: Endpoints::for_environment(environment),
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            nft_contract_address: environment.vehicle_contract().to_string(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    /// Identity from environment, optional JSON file for everything else.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let identity = ClientIdentity::from_env()?;
        match path {
            Some(path) => Self::from_file(path, identity),
            None => Ok(Self::new(identity)),
        }
    }

    pub fn from_file(path: &str, identity: ClientIdentity) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let file: FileConfig = serde_json::from_str(&raw).context("parsing JSON")?;

        let mut cfg = Self::new(identity);
        if let Some(env) = file.environment {
            cfg.environment = env;
            cfg.endpoints = Endpoints::for_environment(env);
            cfg.nft_contract_address = env.vehicle_contract().to_string();
        }
        cfg.endpoints.apply(file.endpoints);
        if let Some(secs) = file.credential_ttl_secs {
            cfg.credential_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = file.upstream_timeout_secs {
            if secs == 0 {
                bail!("upstream_timeout_secs must be greater than zero");
            }
            cfg.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(address) = file.nft_contract_address {
            cfg.nft_contract_address = address;
        }
        Ok(cfg)
    }
}
