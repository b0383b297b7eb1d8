mod common;

use common::{TestLoader, memory_only_config};
use serde_json::json;
use std::sync::atomic::Ordering;
use tiercache::{CacheError, CacheKind, CacheOrchestrator, SetOptions, StorageState};

fn orchestrator() -> CacheOrchestrator {
    CacheOrchestrator::new(memory_only_config(), TestLoader::new())
}

#[tokio::test]
async fn test_dispatch_to_each_cache() {
    let cache = orchestrator();

    cache
        .set("schema", json!({"v": 1}), CacheKind::System, SetOptions::default())
        .await
        .unwrap();
    cache
        .set("home", json!("/home"), CacheKind::Pinned, SetOptions::default())
        .await
        .unwrap();
    cache
        .set("charts", json!("https://ext/charts.js"), CacheKind::Plugin, SetOptions::default())
        .await
        .unwrap();
    cache
        .set("ctx", json!({"user": 7}), CacheKind::Session, SetOptions::default())
        .await
        .unwrap();

    assert_eq!(
        cache.get("schema", CacheKind::System).await.unwrap().into_data(),
        Some(json!({"v": 1}))
    );
    assert_eq!(
        cache.get("home", CacheKind::Pinned).await.unwrap().into_data(),
        Some(json!("/home"))
    );
    let module = cache.get("charts", CacheKind::Plugin).await.unwrap();
    assert_eq!(module.into_module().unwrap().name(), "https://ext/charts.js");
    assert_eq!(
        cache.get("ctx", CacheKind::Session).await.unwrap().into_data(),
        Some(json!({"user": 7}))
    );
}

#[tokio::test]
async fn test_kind_defaults_to_system() {
    let cache = orchestrator();

    cache
        .set("k", json!(1), CacheKind::default(), SetOptions::default())
        .await
        .unwrap();
    assert!(cache.has("k", CacheKind::System).await);
}

#[tokio::test]
async fn test_plugin_set_requires_url_string() {
    let cache = orchestrator();

    let err = cache
        .set("bad", json!({"not": "a url"}), CacheKind::Plugin, SetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidValue(_)));
}

#[tokio::test]
async fn test_plugin_idempotence_through_dispatch() {
    let loader = TestLoader::new();
    let cache = CacheOrchestrator::new(memory_only_config(), loader.clone());

    let first = cache.load_plugin("x", "https://ext/x.js").await.unwrap();
    let second = cache.load_plugin("x", "https://ext/x.js").await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_per_kind() {
    let cache = orchestrator();

    cache.set("a", json!(1), CacheKind::System, SetOptions::default()).await.unwrap();
    cache.set("b", json!(2), CacheKind::Session, SetOptions::default()).await.unwrap();

    assert!(cache.delete("a", CacheKind::System).await);
    assert!(!cache.delete("a", CacheKind::System).await);
    assert!(cache.delete("b", CacheKind::Session).await);
    assert!(!cache.has("a", CacheKind::System).await);
}

#[tokio::test]
async fn test_pinned_survives_other_clears_and_evictions() {
    let mut config = memory_only_config();
    config.system.max_entries = 2;
    let cache = CacheOrchestrator::new(config, TestLoader::new());

    cache
        .set("bookmark", json!("/fav"), CacheKind::Pinned, SetOptions::default())
        .await
        .unwrap();

    // Churn the system cache well past its capacity
    for i in 0..10 {
        cache
            .set(&format!("k{}", i), json!(i), CacheKind::System, SetOptions::default())
            .await
            .unwrap();
    }
    cache.clear(Some(CacheKind::System)).await;
    cache.clear(Some(CacheKind::Session)).await;
    cache.clear(Some(CacheKind::Plugin)).await;

    assert_eq!(
        cache.get("bookmark", CacheKind::Pinned).await.unwrap().into_data(),
        Some(json!("/fav"))
    );

    // Only a pinned clear removes it
    cache.clear(Some(CacheKind::Pinned)).await;
    assert!(cache.get("bookmark", CacheKind::Pinned).await.is_none());
}

#[tokio::test]
async fn test_clear_all_clears_every_cache() {
    let cache = orchestrator();

    cache.set("s", json!(1), CacheKind::System, SetOptions::default()).await.unwrap();
    cache.set("p", json!(2), CacheKind::Pinned, SetOptions::default()).await.unwrap();
    cache.set("e", json!(3), CacheKind::Session, SetOptions::default()).await.unwrap();
    cache.load_plugin("m", "https://ext/m.js").await.unwrap();

    cache.clear(None).await;

    let stats = cache.stats();
    assert_eq!(stats.system.entries, 0);
    assert_eq!(stats.pinned.entries, 0);
    assert_eq!(stats.plugin.entries, 0);
    assert_eq!(stats.session.entries, 0);
}

#[tokio::test]
async fn test_stats_snapshot() {
    let cache = orchestrator();
    cache.init_storage().await;

    cache.set("k", json!(1), CacheKind::System, SetOptions::default()).await.unwrap();
    cache.get("k", CacheKind::System).await;
    cache.get("absent", CacheKind::System).await;

    let stats = cache.stats();
    assert_eq!(stats.storage, StorageState::Unavailable);
    assert_eq!(stats.system.hits, 1);
    assert_eq!(stats.system.misses, 1);
    assert_eq!(stats.system.hit_rate, 50.0);

    // Snapshot serializes for telemetry
    let encoded = serde_json::to_value(&stats).unwrap();
    assert_eq!(encoded["storage"]["state"], json!("unavailable"));
}

#[tokio::test]
async fn test_hit_rate_rounds_to_one_decimal() {
    let cache = orchestrator();

    cache.set("k", json!(1), CacheKind::System, SetOptions::default()).await.unwrap();
    cache.get("k", CacheKind::System).await;
    cache.get("m1", CacheKind::System).await;
    cache.get("m2", CacheKind::System).await;

    // 1 hit, 2 misses -> 33.3
    assert_eq!(cache.stats().system.hit_rate, 33.3);
}

#[tokio::test]
async fn test_ready_resolves_after_init() {
    let cache = orchestrator();
    assert_eq!(cache.storage_state(), StorageState::Pending);

    let waiter = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache.ready().await;
            cache.storage_state()
        })
    };

    cache.init_storage().await;
    assert_eq!(waiter.await.unwrap(), StorageState::Unavailable);
}
