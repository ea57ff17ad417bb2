//! Session lifecycle, key caching and retry behaviour as seen by callers

use std::sync::Arc;
use std::time::Duration;

use fhevm_client::testing::{MemoryConnector, MemoryEngine, StaticKeySource, CONTRACT, USER};
use fhevm_client::{ClientError, ClientSession, EngineError, OperationState, OperationStatus};
use fhevm_core::{ClientConfig, EncryptedPayload, Network};

fn config() -> ClientConfig {
    ClientConfig::new(Network::Localhost)
        .with_contract(CONTRACT)
        .with_key_ttl_secs(60)
        .with_retry(3, 100)
}

#[tokio::test]
async fn test_services_before_init_are_uninitialized() {
    let session = ClientSession::new(
        config(),
        Arc::new(MemoryConnector::new(MemoryEngine::new())),
        Arc::new(StaticKeySource::new()),
    )
    .unwrap();

    assert!(matches!(session.encryption(), Err(ClientError::Uninitialized)));
    assert!(matches!(session.decryption(), Err(ClientError::Uninitialized)));

    session.init().await.unwrap();
    assert!(session.encryption().is_ok());
}

#[tokio::test]
async fn test_second_init_keeps_engine_handle() {
    let connector = Arc::new(MemoryConnector::new(MemoryEngine::new()));
    let session = ClientSession::new(config(), connector.clone(), Arc::new(StaticKeySource::new())).unwrap();

    session.init().await.unwrap();
    let engine = session.engine().unwrap().clone();
    session.init().await.unwrap();
    session.init().await.unwrap();

    assert!(Arc::ptr_eq(&engine, session.engine().unwrap()));
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_shared_session_across_tasks() {
    let connector = Arc::new(MemoryConnector::new(MemoryEngine::new()));
    let keys = Arc::new(StaticKeySource::new().with_delay(Duration::from_millis(20)));
    let session = Arc::new(ClientSession::new(config(), connector.clone(), keys.clone()).unwrap());

    let tasks: Vec<_> = (0..4u32)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move {
                session.init().await?;
                session.encryption()?.encrypt_uint32(i, CONTRACT, USER).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(connector.connects(), 1);
    assert_eq!(keys.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_key_refetched_only_after_ttl() {
    let keys = Arc::new(StaticKeySource::new());
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(MemoryEngine::new())),
        keys.clone(),
    )
    .await
    .unwrap();
    let enc = session.encryption().unwrap();

    enc.encrypt_bool(true, CONTRACT, USER).await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    enc.encrypt_bool(true, CONTRACT, USER).await.unwrap();
    assert_eq!(keys.fetches(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    enc.encrypt_bool(true, CONTRACT, USER).await.unwrap();
    assert_eq!(keys.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidated_key_is_refetched() {
    let keys = Arc::new(StaticKeySource::new());
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(MemoryEngine::new())),
        keys.clone(),
    )
    .await
    .unwrap();

    session.encryption().unwrap().encrypt_bool(true, CONTRACT, USER).await.unwrap();
    session.key_cache().unwrap().invalidate(CONTRACT);
    session.encryption().unwrap().encrypt_bool(false, CONTRACT, USER).await.unwrap();

    assert_eq!(keys.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_engine_failures_retried_with_backoff() {
    let engine = MemoryEngine::new();
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(engine.clone())),
        Arc::new(StaticKeySource::new()),
    )
    .await
    .unwrap();

    engine.fail_next_encrypts(2);
    let started = tokio::time::Instant::now();
    let payload = session
        .encryption()
        .unwrap()
        .encrypt_uint64(5u64, CONTRACT, USER)
        .await
        .unwrap();

    assert_eq!(payload.handles.len(), 1);
    assert_eq!(engine.encrypt_calls(), 3);
    // 100ms after the first failure, 200ms after the second
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_last_engine_error() {
    let engine = MemoryEngine::new();
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(engine.clone())),
        Arc::new(StaticKeySource::new()),
    )
    .await
    .unwrap();

    engine.fail_next_encrypts(10);
    let err = session
        .encryption()
        .unwrap()
        .encrypt_uint64(5u64, CONTRACT, USER)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Engine(EngineError::Transport(_))));
    assert_eq!(engine.encrypt_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_key_fetch_failure_is_reported_as_key_fetch() {
    let engine = MemoryEngine::new();
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(engine.clone())),
        Arc::new(StaticKeySource::new().failing(3)),
    )
    .await
    .unwrap();

    let err = session
        .encryption()
        .unwrap()
        .encrypt_bool(true, CONTRACT, USER)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::KeyFetch { .. }));
    assert_eq!(engine.encrypt_calls(), 0);
}

#[tokio::test]
async fn test_operation_state_tracks_encryption() {
    let session = ClientSession::connect(
        config(),
        Arc::new(MemoryConnector::new(MemoryEngine::new())),
        Arc::new(StaticKeySource::new()),
    )
    .await
    .unwrap();
    let enc = session.encryption().unwrap();

    let mut state: OperationState<EncryptedPayload> = OperationState::new();
    state.track(enc.encrypt_uint8(1u8, CONTRACT, USER)).await.unwrap();
    assert_eq!(state.status(), OperationStatus::Resolved);
    assert_eq!(state.result().map(|p| p.handles.len()), Some(1));

    let result = state.track(enc.encrypt_uint8(256u32, CONTRACT, USER)).await;
    assert!(result.is_err());
    assert_eq!(state.status(), OperationStatus::Failed);
    assert!(state.error().unwrap().contains("out of range"));
}
