//! Connection lifecycle and failure-path tests for StoreWrapper

use std::sync::{Arc, Barrier};
use std::thread;

use futures::executor::block_on;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use storewrap_core::engine::{EngineError, Fault, MemoryEngine};
use storewrap_core::{
    InitOutcome, Operation, Record, StoreConfig, StoreError, StoreWrapper, TransactionMode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn create_store(engine: &MemoryEngine) -> StoreWrapper<String, MemoryEngine> {
    StoreWrapper::new(engine.clone(), "settings", TransactionMode::ReadWrite)
}

#[tokio::test]
async fn test_every_operation_closes_its_connection() {
    init_tracing();
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    store
        .initialize(Record::new("theme", "dark".to_string()))
        .await
        .unwrap();
    store.put(Record::new("lang", "en".to_string())).await.unwrap();
    store.add(Record::new("tz", "UTC".to_string())).await.unwrap();
    store.get("theme").await.unwrap();
    store.get("missing").await.unwrap();
    store.exists("lang").await.unwrap();
    store.delete("tz").await.unwrap();
    store.clear().await.unwrap();

    assert_eq!(engine.open_count(), 8);
    assert_eq!(engine.close_count(), 8);
}

#[tokio::test]
async fn test_failed_request_still_closes_connection() {
    init_tracing();
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    store.add(Record::new("a", "1".to_string())).await.unwrap();
    let err = store.add(Record::new("a", "2".to_string())).await.unwrap_err();
    assert!(err.is_constraint_violation());

    engine.inject_fault(Fault::Request);
    let err = store.get("a").await.unwrap_err();
    assert!(matches!(err, StoreError::Request { operation: Operation::Get, .. }));

    engine.inject_fault(Fault::Request);
    let err = store
        .initialize(Record::new("b", "1".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Request {
            operation: Operation::Initialize,
            ..
        }
    ));

    assert_eq!(engine.open_count(), 4);
    assert_eq!(engine.close_count(), 4);
}

#[tokio::test]
async fn test_failed_transaction_still_closes_connection() {
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    engine.inject_fault(Fault::Transaction);
    let err = store.put(Record::new("a", "1".to_string())).await.unwrap_err();

    assert!(matches!(err, StoreError::Transaction { operation: Operation::Put, .. }));
    assert!(err
        .to_string()
        .starts_with("indexedDB open failed:put indexeddb transaction failed"));
    assert_eq!(engine.open_count(), 1);
    assert_eq!(engine.close_count(), 1);
}

#[tokio::test]
async fn test_open_failure_opens_nothing() {
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    engine.inject_fault(Fault::Open);
    let err = store.get("a").await.unwrap_err();

    assert!(matches!(err, StoreError::Open { operation: Operation::Get, .. }));
    assert!(err
        .to_string()
        .starts_with("indexedDB open failed:get indexeddb request failed"));
    assert_eq!(engine.open_count(), 0);
    assert_eq!(engine.close_count(), 0);
}

#[tokio::test]
async fn test_upgrade_failure() {
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    engine.inject_fault(Fault::Upgrade);
    let err = store
        .initialize(Record::new("a", "1".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Upgrade { .. }));
    assert!(matches!(err.engine_error(), Some(EngineError::Upgrade(_))));
    assert_eq!(engine.version("settings"), None);

    // The next attempt creates the database normally
    store.initialize(Record::new("a", "1".to_string())).await.unwrap();
    assert_eq!(engine.store_names("settings"), vec!["settings"]);
    assert_eq!(engine.open_count(), engine.close_count());
}

#[tokio::test]
async fn test_store_created_once() {
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    store.put(Record::new("a", "1".to_string())).await.unwrap();
    store.put(Record::new("b", "2".to_string())).await.unwrap();

    assert_eq!(engine.version("settings"), Some(1));
    assert_eq!(engine.store_names("settings"), vec!["settings"]);
}

#[tokio::test]
async fn test_version_bump_keeps_records() {
    let engine = MemoryEngine::new();
    let v1 = create_store(&engine);
    v1.put(Record::new("a", "1".to_string())).await.unwrap();

    let v2: StoreWrapper<String, _> = StoreWrapper::from_config(
        engine.clone(),
        StoreConfig::new("settings", TransactionMode::ReadWrite).with_version(2),
    );
    assert_eq!(v2.get("a").await.unwrap(), Some(Record::new("a", "1".to_string())));
    assert_eq!(engine.version("settings"), Some(2));

    // Older version can no longer open the database
    let v1_pinned: StoreWrapper<String, _> = StoreWrapper::from_config(
        engine.clone(),
        StoreConfig::new("settings", TransactionMode::ReadWrite).with_version(1),
    );
    let err = v1_pinned.get("a").await.unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[tokio::test]
async fn test_concurrent_operations_use_independent_connections() {
    init_tracing();
    let engine = MemoryEngine::new();
    let store = create_store(&engine);

    let writes = (0..10).map(|i| store.put(Record::new(format!("k{}", i), i.to_string())));
    let results = join_all(writes).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let reads = (0..10).map(|i| {
        let key = format!("k{}", i);
        let store = &store;
        async move { store.get(&key).await }
    });
    let records = join_all(reads).await;
    for (i, record) in records.into_iter().enumerate() {
        assert_eq!(record.unwrap().unwrap().data, i.to_string());
    }

    assert_eq!(engine.open_count(), 20);
    assert_eq!(engine.close_count(), 20);
}

#[test]
fn test_racing_initialize_creates_once() {
    init_tracing();
    let engine = MemoryEngine::new();

    for round in 0..200 {
        let key = format!("counter-{}", round);
        let barrier = Arc::new(Barrier::new(2));
        let racers: Vec<_> = (0..2i64)
            .map(|i| {
                let store: StoreWrapper<i64, _> =
                    StoreWrapper::new(engine.clone(), "counters", TransactionMode::ReadWrite);
                let barrier = barrier.clone();
                let key = key.clone();
                thread::spawn(move || {
                    barrier.wait();
                    block_on(store.initialize(Record::new(key, i))).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<InitOutcome<i64>> =
            racers.into_iter().map(|t| t.join().unwrap()).collect();
        let created: Vec<_> = outcomes
            .into_iter()
            .filter(InitOutcome::is_created)
            .map(InitOutcome::into_record)
            .collect();
        assert_eq!(created.len(), 1, "round {}", round);

        let reader: StoreWrapper<i64, _> =
            StoreWrapper::new(engine.clone(), "counters", TransactionMode::ReadOnly);
        assert_eq!(block_on(reader.get(&key)).unwrap(), Some(created[0].clone()));
    }

    assert_eq!(engine.open_count(), engine.close_count());
}

#[test]
fn test_upgrade_keeps_concurrent_writes() {
    init_tracing();
    let engine = MemoryEngine::new();
    let writer: StoreWrapper<u32, _> =
        StoreWrapper::new(engine.clone(), "events", TransactionMode::ReadWrite);
    block_on(writer.clear()).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let writes = {
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            for i in 0..100 {
                block_on(writer.put(Record::new(format!("e{}", i), i))).unwrap();
            }
            writer
        })
    };
    let upgrades = {
        let engine = engine.clone();
        thread::spawn(move || {
            barrier.wait();
            for version in 2..=100 {
                let config = StoreConfig::new("events", TransactionMode::ReadOnly)
                    .with_version(version);
                let store: StoreWrapper<u32, _> = StoreWrapper::from_config(engine.clone(), config);
                block_on(store.exists("e0")).unwrap();
            }
        })
    };

    let writer = writes.join().unwrap();
    upgrades.join().unwrap();

    assert_eq!(engine.version("events"), Some(100));
    assert_eq!(writer.engine().record_count("events", "events"), 100);
}
