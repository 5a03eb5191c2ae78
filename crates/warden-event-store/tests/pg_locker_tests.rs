//! Integration tests for `PgLocker` and `PgWatermarkStore`.

use std::time::Duration;

use sqlx::PgPool;
use warden_core::error::DomainError;
use warden_core::lock::Locker;
use warden_core::watermark::WatermarkStore;
use warden_event_store::pg_locker::PgLocker;
use warden_event_store::pg_watermark_store::PgWatermarkStore;

#[sqlx::test(migrations = "../../migrations")]
async fn test_second_holder_gets_lock_held_while_lease_is_live(pool: PgPool) {
    let locker = PgLocker::new(pool);
    let wait = Duration::from_secs(30);

    locker.renew("instance-1", "policy-view", wait).await.unwrap();
    let result = locker.renew("instance-2", "policy-view", wait).await;

    match result {
        Err(DomainError::LockHeld { view_id }) => assert_eq!(view_id, "policy-view"),
        other => panic!("expected LockHeld, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_holder_can_renew_its_own_lease(pool: PgPool) {
    let locker = PgLocker::new(pool);
    let wait = Duration::from_secs(30);

    locker.renew("instance-1", "policy-view", wait).await.unwrap();
    locker.renew("instance-1", "policy-view", wait).await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_expired_lease_can_be_taken_over(pool: PgPool) {
    let locker = PgLocker::new(pool);

    locker
        .renew("instance-1", "policy-view", Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    locker
        .renew("instance-2", "policy-view", Duration::from_secs(30))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_watermark_advances_and_never_regresses(pool: PgPool) {
    let store = PgWatermarkStore::new(pool);

    assert_eq!(store.current("lockout_policies").await.unwrap(), 0);
    store.advance("lockout_policies", 5).await.unwrap();
    store.advance("lockout_policies", 2).await.unwrap();

    assert_eq!(store.current("lockout_policies").await.unwrap(), 5);

    store.reset("lockout_policies").await.unwrap();
    assert_eq!(store.current("lockout_policies").await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reset_request_is_visible_to_every_store_on_the_pool(pool: PgPool) {
    // Arrange
    let filing = PgWatermarkStore::new(pool.clone());
    let holding = PgWatermarkStore::new(pool);
    holding.advance("iam_members", 4).await.unwrap();

    // Act
    filing.request_reset("iam_members").await.unwrap();
    let pending = holding.reset_requested("iam_members").await.unwrap();
    holding.reset("iam_members").await.unwrap();

    // Assert
    assert!(pending);
    assert!(!holding.reset_requested("iam_members").await.unwrap());
    assert_eq!(holding.current("iam_members").await.unwrap(), 0);
}
