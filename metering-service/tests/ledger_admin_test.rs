//! Grant, plan-sync and usage-inspection tests for the privileged surface.

mod common;

use common::{spawn_app, spawn_app_with};
use metering_service::services::RenewalPolicy;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn grant_increases_the_balance() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-1", "user1@example.com").await;
    let resp = app.admin_grant(account_id, 30).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 30);

    let resp = app.admin_grant(account_id, 12).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 42);
}

#[tokio::test]
async fn non_positive_grant_is_rejected() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-2", "user2@example.com").await;
    assert_eq!(app.admin_grant(account_id, 0).await.status(), 400);
    assert_eq!(app.admin_grant(account_id, -5).await.status(), 400);

    let resp = app.get_balance("user-2", "user2@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 0);
}

#[tokio::test]
async fn grant_to_unknown_account_is_not_found() {
    let app = spawn_app().await;
    assert_eq!(app.admin_grant(Uuid::new_v4(), 10).await.status(), 404);
}

#[tokio::test]
async fn grant_by_non_admin_is_forbidden() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-3", "user3@example.com").await;
    let resp = app
        .client
        .post(format!("{}/admin/credits/grant", app.address))
        .header("x-caller-id", "acct-user")
        .header("x-caller-email", "user@example.com")
        .json(&json!({ "accountId": account_id, "amount": 10, "reason": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app.get_balance("user-3", "user3@example.com").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 0);
}

#[tokio::test]
async fn sync_with_reset_policy_sets_the_balance_to_the_grant() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-4", "user4@example.com").await;
    assert_eq!(app.admin_grant(account_id, 900).await.status(), 200);

    let resp = app.admin_sync(account_id, "pro").await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 500);
    assert!(!body["lastSyncedAt"].is_null());
}

#[tokio::test]
async fn sync_with_topup_policy_never_lowers_the_balance() {
    let app = spawn_app_with(RenewalPolicy::TopUp).await;

    let rich = app.seed_account("user-5", "user5@example.com").await;
    assert_eq!(app.admin_grant(rich, 900).await.status(), 200);
    let resp = app.admin_sync(rich, "pro").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 900);

    let poor = app.seed_account("user-6", "user6@example.com").await;
    assert_eq!(app.admin_grant(poor, 100).await.status(), 200);
    let resp = app.admin_sync(poor, "pro").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 500);
}

#[tokio::test]
async fn sync_applies_plan_credit_overrides() {
    let app = spawn_app().await;

    let resp = app
        .admin_put_settings(&json!({ "planCredits": { "pro": 650 } }))
        .await;
    assert_eq!(resp.status(), 200);

    let account_id = app.seed_account("user-7", "user7@example.com").await;
    let resp = app.admin_sync(account_id, "pro").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["creditsRemaining"], 650);
}

#[tokio::test]
async fn sync_to_unknown_plan_is_rejected() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-8", "user8@example.com").await;
    assert_eq!(app.admin_sync(account_id, "enterprise").await.status(), 400);
}

#[tokio::test]
async fn usage_inspection_is_admin_gated() {
    let app = spawn_app().await;

    let account_id = app.seed_account("user-9", "user9@example.com").await;
    assert_eq!(app.admin_grant(account_id, 10).await.status(), 200);
    let resp = app
        .debit(
            "user-9",
            "user9@example.com",
            &json!({ "operation": "ai_document_analysis" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    // Admin sees the record.
    let resp = app
        .client
        .get(format!("{}/admin/usage/{}", app.address, account_id))
        .header("x-caller-id", common::ADMIN_ID)
        .header("x-caller-email", common::ADMIN_EMAIL)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["operation"], "ai_document_analysis");
    assert_eq!(records[0]["creditsUsed"], 3);

    // The account owner is not an administrator.
    let resp = app
        .client
        .get(format!("{}/admin/usage/{}", app.address, account_id))
        .header("x-caller-id", "user-9")
        .header("x-caller-email", "user9@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
