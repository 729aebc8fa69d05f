use super::*;
use serde_json::json;

fn items(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_set_and_get() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .set(StoreScope::Local, items(&[("caseCache_500A", json!({"status": "New"}))]))
        .await
        .unwrap();

    let value = store.get(StoreScope::Local, "caseCache_500A").await.unwrap();
    assert_eq!(value, Some(json!({"status": "New"})));
    assert_eq!(store.get(StoreScope::Local, "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_scopes_are_separate() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .set(StoreScope::Sync, items(&[("flag", json!(true))]))
        .await
        .unwrap();

    assert_eq!(store.get(StoreScope::Local, "flag").await.unwrap(), None);
    assert_eq!(store.get(StoreScope::Sync, "flag").await.unwrap(), Some(json!(true)));
}

#[tokio::test]
async fn test_overwrite_updates_usage() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .set(StoreScope::Local, items(&[("k", json!("aaaaaaaa"))]))
        .await
        .unwrap();
    store
        .set(StoreScope::Local, items(&[("k", json!("a"))]))
        .await
        .unwrap();

    let expected = entry_size("k", &json!("a"));
    assert_eq!(store.bytes_in_use(StoreScope::Local).await.unwrap(), expected);
}

#[tokio::test]
async fn test_get_all_remove_and_clear() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .set(
            StoreScope::Local,
            items(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]),
        )
        .await
        .unwrap();

    store
        .remove(StoreScope::Local, &["a".to_string(), "zzz".to_string()])
        .await
        .unwrap();
    let all = store.get_all(StoreScope::Local).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("b"), Some(&json!(2)));

    store.clear(StoreScope::Local).await.unwrap();
    assert!(store.get_all(StoreScope::Local).await.unwrap().is_empty());
    assert_eq!(store.bytes_in_use(StoreScope::Local).await.unwrap(), 0);
}

#[tokio::test]
async fn test_quota_exceeded_leaves_store_unchanged() {
    let store = SqliteStore::in_memory()
        .await
        .unwrap()
        .with_quota(StoreScope::Local, Some(20));
    store
        .set(StoreScope::Local, items(&[("a", json!("small"))]))
        .await
        .unwrap();

    let result = store
        .set(StoreScope::Local, items(&[("b", json!("this value is far too long"))]))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::QuotaExceeded { scope: StoreScope::Local, quota: 20, .. })
    ));
    assert_eq!(store.get(StoreScope::Local, "b").await.unwrap(), None);
    assert_eq!(store.get(StoreScope::Local, "a").await.unwrap(), Some(json!("small")));
}

#[tokio::test]
async fn test_default_quotas() {
    let store = SqliteStore::in_memory().await.unwrap();
    assert_eq!(store.quota_bytes(StoreScope::Sync), Some(102_400));
    assert_eq!(store.quota_bytes(StoreScope::Local), None);
}

#[tokio::test]
async fn test_file_backed_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caselens.db");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store
            .set(StoreScope::Sync, items(&[("customerDataSource", json!("scraped"))]))
            .await
            .unwrap();
    }

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.get(StoreScope::Sync, "customerDataSource").await.unwrap(),
        Some(json!("scraped"))
    );
}
