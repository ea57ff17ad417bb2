//! Client configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::validate_address;

/// Default lifetime of a cached public key
pub const DEFAULT_KEY_TTL_SECS: u64 = 60 * 60;

/// Default number of attempts for network operations
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// fhEVM deployment the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Sepolia,
    Localhost,
    Mainnet,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Sepolia => 11_155_111,
            Network::Localhost => 31_337,
            Network::Mainnet => 1,
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Localhost => "http://127.0.0.1:8545",
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
        }
    }

    pub fn default_gateway_url(&self) -> &'static str {
        match self {
            Network::Sepolia => "https://gateway.sepolia.zama.ai",
            Network::Localhost => "http://localhost:8545",
            Network::Mainnet => "https://gateway.zama.ai",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Sepolia => write!(f, "sepolia"),
            Network::Localhost => write!(f, "localhost"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sepolia" => Ok(Network::Sepolia),
            "localhost" => Ok(Network::Localhost),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(crate::Error::InvalidConfig(format!("unknown network: {}", other))),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Sepolia
    }
}

/// Retry settings as they appear in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_key_ttl_secs() -> u64 {
    DEFAULT_KEY_TTL_SECS
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

/// Configuration a client session is built from
///
/// A session never mutates its configuration; targeting another contract or
/// network means building a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Deployment selector, picks default endpoints and chain id
    #[serde(default)]
    pub network: Network,
    /// Contract that scopes key caching and public decryption
    #[serde(default)]
    pub contract_address: Option<String>,
    /// JSON-RPC endpoint override
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Gateway endpoint override
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Chain id override
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Public key cache lifetime in seconds
    #[serde(default = "default_key_ttl_secs")]
    pub key_ttl_secs: u64,
    /// Retry policy for key fetches and engine calls
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ClientConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            contract_address: None,
            rpc_url: None,
            gateway_url: None,
            chain_id: None,
            key_ttl_secs: DEFAULT_KEY_TTL_SECS,
            retry: RetrySettings::default(),
        }
    }

    pub fn with_contract(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    pub fn with_key_ttl_secs(mut self, secs: u64) -> Self {
        self.key_ttl_secs = secs;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.retry = RetrySettings {
            max_attempts,
            base_delay_ms,
        };
        self
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(address) = &self.contract_address {
            validate_address("contract address", address)?;
        }
        for (field, url) in [("rpcUrl", &self.rpc_url), ("gatewayUrl", &self.gateway_url)] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(crate::Error::InvalidConfig(format!(
                        "{} must be an http(s) URL, got {}",
                        field, url
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_rpc_url())
    }

    pub fn gateway_url(&self) -> &str {
        self.gateway_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_gateway_url())
            .trim_end_matches('/')
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.unwrap_or_else(|| self.network.chain_id())
    }

    /// Configured contract, or an error if none was set
    pub fn contract_address(&self) -> crate::Result<&str> {
        self.contract_address
            .as_deref()
            .ok_or_else(|| crate::Error::InvalidConfig("contract address not configured".into()))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Network::default())
    }
}
