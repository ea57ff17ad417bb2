//! Client session: owns configuration, engine handle, key cache and services

use std::sync::Arc;
use std::time::Duration;

use fhevm_core::ClientConfig;
use tokio::sync::OnceCell;

use crate::decryption::DecryptionService;
use crate::encryption::EncryptionService;
use crate::engine::{EngineConnector, FheEngine, KeySource};
use crate::error::{ClientError, Result};
use crate::key_cache::KeyCache;
use crate::metrics::{self, OP_CONNECT};
use crate::retry::RetryPolicy;

struct Ready {
    engine: Arc<dyn FheEngine>,
    keys: Arc<KeyCache>,
    encryption: EncryptionService,
    decryption: DecryptionService,
}

/// Entry point for encryption and decryption
///
/// Created uninitialized; [`init`](Self::init) connects the engine once and
/// wires the services. Sessions are `Send + Sync` and can be shared across
/// tasks behind an `Arc`.
pub struct ClientSession {
    config: ClientConfig,
    connector: Arc<dyn EngineConnector>,
    key_source: Arc<dyn KeySource>,
    ready: OnceCell<Ready>,
}

impl ClientSession {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn EngineConnector>,
        key_source: Arc<dyn KeySource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            key_source,
            ready: OnceCell::new(),
        })
    }

    /// Create and initialize in one step
    pub async fn connect(
        config: ClientConfig,
        connector: Arc<dyn EngineConnector>,
        key_source: Arc<dyn KeySource>,
    ) -> Result<Self> {
        let session = Self::new(config, connector, key_source)?;
        session.init().await?;
        Ok(session)
    }

    /// Connect the engine and build the services
    ///
    /// Idempotent: concurrent and repeated calls share one engine handle. A
    /// failed init leaves the session uninitialized so it can be retried.
    pub async fn init(&self) -> Result<()> {
        self.ready.get_or_try_init(|| self.connect_engine()).await?;
        Ok(())
    }

    async fn connect_engine(&self) -> Result<Ready> {
        tracing::info!(
            network = %self.config.network,
            chain_id = self.config.chain_id(),
            gateway = %self.config.gateway_url(),
            "Initializing FHE engine"
        );

        let retry = RetryPolicy::from(self.config.retry);
        let connector = &self.connector;
        let config = &self.config;
        let engine = retry
            .execute(OP_CONNECT, move || async move {
                let result = connector.connect(config).await;
                metrics::record_engine_call(OP_CONNECT, result.is_ok());
                result
            })
            .await?;

        let keys = Arc::new(KeyCache::new(
            self.key_source.clone(),
            Duration::from_secs(self.config.key_ttl_secs),
            retry,
        ));
        let encryption = EncryptionService::new(engine.clone(), keys.clone(), retry);
        let mut decryption = DecryptionService::new(engine.clone(), retry);
        if let Some(contract) = &self.config.contract_address {
            decryption = decryption.with_default_contract(contract.clone());
        }

        tracing::info!(key_ttl_secs = self.config.key_ttl_secs, "FHE engine ready");

        Ok(Ready {
            engine,
            keys,
            encryption,
            decryption,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> Result<&Arc<dyn FheEngine>> {
        self.ready().map(|r| &r.engine)
    }

    pub fn encryption(&self) -> Result<&EncryptionService> {
        self.ready().map(|r| &r.encryption)
    }

    pub fn decryption(&self) -> Result<&DecryptionService> {
        self.ready().map(|r| &r.decryption)
    }

    pub fn key_cache(&self) -> Result<&Arc<KeyCache>> {
        self.ready().map(|r| &r.keys)
    }

    fn ready(&self) -> Result<&Ready> {
        self.ready.get().ok_or(ClientError::Uninitialized)
    }
}
