//! 维护与配置集成测试

use chrono::{Duration, Utc};
use tokenrs::{
    ClearDeadTokens, GeneratorRegistry, InMemoryTokenStore, OwnerRef, PreviousStrategy,
    QueryScope, TimeSpec, TokenManager, TokenRegistry, TokenStore, TokensConfig,
};

fn user() -> OwnerRef {
    OwnerRef::new("user", "1")
}

/// 测试清理已过期、已使用和已软删除的 token，只保留活跃 token
#[tokio::test]
async fn test_dead_tokens_are_removed() {
    let store = InMemoryTokenStore::new();
    let registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
    let manager = TokenManager::new(store.clone(), registry);

    store
        .create(&user(), "verify", "EXPIRED", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    let active = store
        .create(&user(), "verify", "ACTIVE", Utc::now() + Duration::days(365))
        .await
        .unwrap();
    let used = store
        .create(&user(), "verify", "USED", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    store
        .mark_used(&used, Utc::now() - Duration::days(1))
        .await
        .unwrap();
    let deleted = store
        .create(&user(), "verify", "DELETED", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    store.soft_delete(&deleted).await.unwrap();

    let report = ClearDeadTokens::new(&manager).run().await.unwrap();
    assert_eq!(report.removed, 3);
    assert_eq!(report.to_string(), "All dead tokens have been removed (3).");

    assert_eq!(store.count(QueryScope::All).await.unwrap(), 1);
    assert_eq!(store.snapshot(), vec![active]);

    // 再次执行不会删除任何记录
    assert_eq!(manager.reap().await.unwrap(), 0);
}

/// 测试从 JSON 配置创建管理器
#[tokio::test]
async fn test_manager_from_config() {
    let config = TokensConfig::from_json(
        r#"{
            "defaults": { "generation_throttling": false },
            "define": {
                "sms.verification": {
                    "ttl": 10,
                    "previous": "reuse",
                    "generator": "short_code"
                },
                "reset.password": {}
            },
            "generation_attempts": 5
        }"#,
    )
    .unwrap();

    let store = InMemoryTokenStore::new();
    let manager = TokenManager::from_config(
        config,
        GeneratorRegistry::with_defaults("APP_KEY"),
        store.clone(),
    )
    .unwrap();

    assert_eq!(
        manager.registry().defined(),
        vec!["reset.password", "sms.verification"]
    );

    let sms = manager.resolve_token_type("sms.verification").unwrap();
    assert_eq!(sms.ttl().unwrap(), TimeSpec::Minutes(10));
    assert_eq!(sms.previous_strategy().unwrap(), PreviousStrategy::Reuse);
    assert!(sms.generation_throttle().is_none());

    let first = manager.generate_for(&user(), "sms.verification").await.unwrap();
    let second = manager.generate_for(&user(), "sms.verification").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.value.len(), 8);

    let reset = manager.generate_for(&user(), "reset.password").await.unwrap();
    assert_eq!(reset.value.len(), 64);
    assert_eq!(store.len(), 2);
}

/// 测试无效配置
#[test]
fn test_invalid_config() {
    assert!(TokensConfig::from_json(r#"{ "define": { "verify": { "ttl": "soon" } } }"#).is_err());
    assert!(TokensConfig::from_json(r#"{ "define": { "verify": { "usage_attempts": "many" } } }"#).is_err());
    assert!(TokensConfig::from_json(r#"{ "generation_attempts": 0 }"#).is_err());
}
