//! Debit arithmetic, insufficiency and linearizability tests.

mod common;

use common::spawn_app;
use futures::future::join_all;
use metering_service::services::MeteringStore;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn debit_applies_the_overridden_cost_and_records_usage() {
    let app = spawn_app().await;

    // Override ai_text_chat cost to 3.
    let resp = app
        .admin_put_settings(&json!({ "featureCosts": { "ai_text_chat": 3 } }))
        .await;
    assert_eq!(resp.status(), 200);

    // Account with balance 10.
    let account_id = app.seed_account("user-1", "user1@example.com").await;
    assert_eq!(app.admin_grant(account_id, 10).await.status(), 200);

    let resp = app
        .debit("user-1", "user1@example.com", &json!({ "operation": "ai_text_chat" }))
        .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsUsed"], 3);
    assert_eq!(body["creditsRemaining"], 7);

    let store: Arc<dyn MeteringStore> = app.store.clone();
    let records = store.list_usage_records(account_id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].credits_used, 3);
    assert_eq!(records[0].operation_key, "ai_text_chat");
}

#[tokio::test]
async fn insufficient_balance_fails_without_partial_deduction() {
    let app = spawn_app().await;

    // Balance 2, operation costs 5 by default.
    let account_id = app.seed_account("user-2", "user2@example.com").await;
    assert_eq!(app.admin_grant(account_id, 2).await.status(), 200);

    let resp = app
        .debit(
            "user-2",
            "user2@example.com",
            &json!({ "operation": "ai_image_generation" }),
        )
        .await;
    assert_eq!(resp.status(), 402);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "insufficient_credits");

    // Balance unchanged, no usage record written.
    let resp = app.get_balance("user-2", "user2@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 2);

    let store: Arc<dyn MeteringStore> = app.store.clone();
    assert!(store
        .list_usage_records(account_id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn quantity_multiplies_the_effective_cost() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-3", "user3@example.com").await;
    assert_eq!(app.admin_grant(account_id, 10).await.status(), 200);

    let resp = app
        .debit(
            "user-3",
            "user3@example.com",
            &json!({ "operation": "ai_text_chat", "quantity": 4 }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsUsed"], 4);
    assert_eq!(body["creditsRemaining"], 6);
}

#[tokio::test]
async fn unrecognized_operation_is_a_hard_error() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-4", "user4@example.com").await;
    assert_eq!(app.admin_grant(account_id, 10).await.status(), 200);

    let resp = app
        .debit(
            "user-4",
            "user4@example.com",
            &json!({ "operation": "ai_time_travel" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Nothing charged, nothing recorded.
    let resp = app.get_balance("user-4", "user4@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 10);
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let app = spawn_app().await;

    let resp = app
        .debit(
            "user-5",
            "user5@example.com",
            &json!({ "operation": "ai_text_chat", "quantity": 0 }),
        )
        .await;
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn concurrent_debits_never_jointly_overdraw() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-6", "user6@example.com").await;
    assert_eq!(app.admin_grant(account_id, 5).await.status(), 200);

    // 20 concurrent unit-cost debits against a balance of 5: exactly 5 may
    // pass the sufficiency check.
    let body = json!({ "operation": "ai_text_chat" });
    let requests = (0..20).map(|_| {
        app.debit("user-6", "user6@example.com", &body)
    });
    let responses = join_all(requests).await;

    let successes = responses.iter().filter(|r| r.status() == 200).count();
    let rejections = responses.iter().filter(|r| r.status() == 402).count();
    assert_eq!(successes, 5);
    assert_eq!(rejections, 15);

    let resp = app.get_balance("user-6", "user6@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 0);

    let store: Arc<dyn MeteringStore> = app.store.clone();
    assert_eq!(store.list_usage_records(account_id, 50).await.unwrap().len(), 5);
}
