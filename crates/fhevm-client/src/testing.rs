//! In-memory engine and key source for tests
//!
//! `MemoryEngine` "encrypts" by minting sequential handles and remembering
//! the plaintext behind each one, so decrypting a handle returns exactly what
//! was encrypted. Call counters and failure injection let tests observe
//! retries and how many calls reached the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fhevm_core::{Ciphertext, ClientConfig, EncryptedPayload, Handle, Plaintext, U256};

use crate::engine::{EngineConnector, EngineError, EngineInput, FheEngine, KeyMaterial, KeySource};

pub const CONTRACT: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const USER: &str = "0x1111111111111111111111111111111111111111";

const HANDLE_LEN: usize = 32;

/// Take one unit from a failure budget, returning whether it was available
fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Default)]
struct EngineState {
    next_handle: Mutex<u64>,
    plaintexts: Mutex<HashMap<Handle, Plaintext>>,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
    encrypt_failures: AtomicUsize,
    decrypt_failures: AtomicUsize,
}

/// Identity engine: decrypt(encrypt(v)) == v
#[derive(Clone, Default)]
pub struct MemoryEngine {
    state: Arc<EngineState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt round-trips that reached the engine, failed ones included
    pub fn encrypt_calls(&self) -> usize {
        self.state.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.state.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` encrypt calls fail with a network error
    pub fn fail_next_encrypts(&self, n: usize) {
        self.state.encrypt_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` decrypt calls fail with a network error
    pub fn fail_next_decrypts(&self, n: usize) {
        self.state.decrypt_failures.store(n, Ordering::SeqCst);
    }

    /// Store a plaintext directly and return its handle
    pub fn insert(&self, plaintext: Plaintext) -> Handle {
        self.state.mint(plaintext)
    }
}

impl EngineState {
    fn mint(&self, plaintext: Plaintext) -> Handle {
        let id = {
            let mut next = self.next_handle.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let mut bytes = [0u8; HANDLE_LEN];
        bytes[HANDLE_LEN - 8..].copy_from_slice(&id.to_be_bytes());
        let handle = Handle::from_bytes(&bytes).expect("32 bytes always form a valid handle");
        self.plaintexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone(), plaintext);
        handle
    }

    fn lookup(&self, handle: &Handle) -> Option<Plaintext> {
        self.plaintexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }
}

struct MemoryInput {
    state: Arc<EngineState>,
    contract: String,
    values: Vec<Plaintext>,
}

#[async_trait]
impl EngineInput for MemoryInput {
    fn add_bool(&mut self, value: bool) {
        self.values.push(Plaintext::Bool(value));
    }

    fn add_uint(&mut self, _bits: usize, value: U256) {
        self.values.push(Plaintext::Uint(value));
    }

    fn add_address(&mut self, value: &str) {
        self.values.push(Plaintext::Address(value.to_string()));
    }

    fn add_bytes(&mut self, value: &[u8]) {
        self.values.push(Plaintext::Bytes(value.to_vec()));
    }

    async fn encrypt(self: Box<Self>) -> Result<EncryptedPayload, EngineError> {
        let MemoryInput {
            state,
            contract,
            values,
        } = *self;

        state.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&state.encrypt_failures) {
            return Err(EngineError::Transport("injected encrypt failure".into()));
        }

        let handles: Vec<Handle> = values.into_iter().map(|v| state.mint(v)).collect();
        let ciphertext = handles
            .iter()
            .flat_map(|h| h.as_str().bytes())
            .collect::<Vec<u8>>();

        Ok(EncryptedPayload {
            ciphertext,
            input_proof: contract.into_bytes(),
            handles,
        })
    }
}

#[async_trait]
impl FheEngine for MemoryEngine {
    fn create_input(&self, _key: &KeyMaterial, contract: &str, _requester: &str) -> Box<dyn EngineInput> {
        Box::new(MemoryInput {
            state: self.state.clone(),
            contract: contract.to_string(),
            values: Vec::new(),
        })
    }

    async fn decrypt(&self, _contract: &str, ciphertext: &Ciphertext) -> Result<Plaintext, EngineError> {
        self.state.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.state.decrypt_failures) {
            return Err(EngineError::Transport("injected decrypt failure".into()));
        }

        let handle = match ciphertext {
            Ciphertext::Handle(h) => Some(h),
            Ciphertext::Payload(p) => p.handles.first(),
        };
        handle
            .and_then(|h| self.state.lookup(h))
            .ok_or_else(|| EngineError::Failure("unknown handle".into()))
    }
}

/// Connector handing out one shared [`MemoryEngine`]
#[derive(Default)]
pub struct MemoryConnector {
    engine: MemoryEngine,
    connects: AtomicUsize,
    failures: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(engine: MemoryEngine) -> Self {
        Self {
            engine,
            ..Default::default()
        }
    }

    /// Make the first `n` connection attempts fail
    pub fn failing(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineConnector for MemoryConnector {
    async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn FheEngine>, EngineError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err(EngineError::Transport("injected connect failure".into()));
        }
        Ok(Arc::new(self.engine.clone()))
    }
}

/// Key source returning a fixed key, counting fetches
pub struct StaticKeySource {
    key: KeyMaterial,
    delay: Duration,
    fetches: AtomicUsize,
    failures: AtomicUsize,
}

impl StaticKeySource {
    pub fn new() -> Self {
        Self {
            key: KeyMaterial::new(vec![0x5a; 32]),
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make the first `n` fetches fail
    pub fn failing(self, n: usize) -> Self {
        self.fail_next(n);
        self
    }

    /// Make the next `n` fetches fail
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for StaticKeySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_public_key(&self, _contract: &str) -> Result<KeyMaterial, EngineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if take_failure(&self.failures) {
            return Err(EngineError::Transport("injected key fetch failure".into()));
        }
        Ok(self.key.clone())
    }
}
