//! Balance read and lazy-creation tests.

mod common;

use common::spawn_app;
use metering_service::services::MeteringStore;
use std::sync::Arc;

#[tokio::test]
async fn first_balance_read_creates_a_zero_row_without_a_plan() {
    let app = spawn_app().await;

    let resp = app.get_balance("user-1", "user1@example.com").await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 0);
    assert!(body["lastSyncedAt"].is_null());

    // The row is stable: a second read sees the same account and balance.
    let resp = app.get_balance("user-1", "user1@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 0);
}

#[tokio::test]
async fn first_balance_read_is_seeded_from_the_plan_grant() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-2", "user2@example.com").await;
    let store: Arc<dyn MeteringStore> = app.store.clone();
    store.set_account_plan(account_id, "free").await.unwrap();

    let resp = app.get_balance("user-2", "user2@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 25);
}

#[tokio::test]
async fn plan_grant_override_applies_to_the_initial_seed() {
    let app = spawn_app().await;

    let resp = app
        .admin_put_settings(&serde_json::json!({ "planCredits": { "free": 40 } }))
        .await;
    assert_eq!(resp.status(), 200);

    let account_id = app.seed_account("user-3", "user3@example.com").await;
    let store: Arc<dyn MeteringStore> = app.store.clone();
    store.set_account_plan(account_id, "free").await.unwrap();

    let resp = app.get_balance("user-3", "user3@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 40);
}

#[tokio::test]
async fn balance_read_without_identity_is_unauthorized() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/credits/balance", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
