//! Service health and metrics endpoint tests.

mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_reports_ok() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "metering-service");
}

#[tokio::test]
async fn readiness_check_reports_ok() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let app = spawn_app().await;

    // Generate at least one observable request first.
    app.get_balance("user-1", "user1@example.com").await;

    let resp = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = resp.text().await.unwrap();
    assert!(body.contains("metering_api_requests_total"));
}
