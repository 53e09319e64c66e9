use std::time::Duration;

use tollgate_cache::InMemoryTier;
use tollgate_core::CacheTier;

#[tokio::test]
async fn set_then_get_returns_value() {
    let tier = InMemoryTier::new("fast", Duration::from_secs(60));
    tier.set("k", b"hello").await.unwrap();

    let entry = tier.get("k").await.unwrap().expect("entry should exist");
    assert_eq!(entry.value, b"hello");
    assert_eq!(entry.key, "k");
}

#[tokio::test]
async fn get_missing_key_returns_none() {
    let tier = InMemoryTier::new("fast", Duration::from_secs(60));
    assert!(tier.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let tier = InMemoryTier::new("fast", Duration::from_millis(50));
    tier.set("k", b"v").await.unwrap();
    assert!(tier.get("k").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tier.get("k").await.unwrap().is_none());
    // Lazy expiry also reclaims the slot.
    assert_eq!(tier.len().await, 0);
}

#[tokio::test]
async fn cap_evicts_oldest_entry_first() {
    let tier = InMemoryTier::with_max_entries("fast", Duration::from_secs(60), 2);
    tier.set("first", b"1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    tier.set("second", b"2").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    tier.set("third", b"3").await.unwrap();

    assert!(tier.get("first").await.unwrap().is_none());
    assert!(tier.get("second").await.unwrap().is_some());
    assert!(tier.get("third").await.unwrap().is_some());
    assert_eq!(tier.len().await, 2);
}

#[tokio::test]
async fn overwriting_existing_key_does_not_evict() {
    let tier = InMemoryTier::with_max_entries("fast", Duration::from_secs(60), 2);
    tier.set("a", b"1").await.unwrap();
    tier.set("b", b"2").await.unwrap();
    tier.set("a", b"updated").await.unwrap();

    assert_eq!(tier.get("a").await.unwrap().unwrap().value, b"updated");
    assert!(tier.get("b").await.unwrap().is_some());
}
