//! Plan listing tests.

mod common;

use common::{spawn_app, test_plan};

#[tokio::test]
async fn lists_active_plans_in_sort_order() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/plans", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0]["planKey"], "free");
    assert_eq!(plans[1]["planKey"], "pro");
    assert_eq!(plans[1]["baseCreditGrant"], 500);
}

#[tokio::test]
async fn inactive_plans_are_hidden() {
    let app = spawn_app().await;

    let mut retired = test_plan("legacy", 10, 9);
    retired.is_active = false;
    app.store.insert_plan(retired);

    let resp = app
        .client
        .get(format!("{}/plans", app.address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["planKey"].as_str().unwrap())
        .collect();
    assert!(!keys.contains(&"legacy"));
}
