//! Public key source backed by the fhEVM gateway HTTP API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use fhevm_core::validation::decode_hex_bytes;
use fhevm_core::ClientConfig;

use crate::engine::{EngineError, KeyMaterial, KeySource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response from the keys endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub contract_address: String,
    pub public_key: String,
}

/// Fetches contract public keys with `GET {gateway}/keys?contractAddress=`
pub struct GatewayKeySource {
    http: Client,
    gateway_url: String,
}

impl GatewayKeySource {
    pub fn new(gateway_url: &str) -> Result<Self, EngineError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, EngineError> {
        Self::new(config.gateway_url())
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }
}

#[async_trait]
impl KeySource for GatewayKeySource {
    async fn fetch_public_key(&self, contract: &str) -> Result<KeyMaterial, EngineError> {
        let url = format!("{}/keys", self.gateway_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("contractAddress", contract)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EngineError::Rejected {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let body: KeyResponse = resp.json().await?;
        if !body.contract_address.eq_ignore_ascii_case(contract) {
            return Err(EngineError::Failure(format!(
                "gateway returned key for {} instead of {}",
                body.contract_address, contract
            )));
        }

        let key = decode_hex_bytes(&body.public_key).map_err(|e| EngineError::Failure(e.to_string()))?;
        if key.is_empty() {
            return Err(EngineError::Failure("gateway returned an empty public key".into()));
        }

        tracing::debug!(contract = %contract, key_bytes = key.len(), "Fetched public key from gateway");
        Ok(KeyMaterial::new(key))
    }
}
