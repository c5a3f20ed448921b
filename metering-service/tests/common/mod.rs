//! Common test utilities for metering-service integration tests.

use chrono::Utc;
use metering_service::config::{
    AdminConfig, CacheConfig, DatabaseConfig, MeteringConfig, ObserveConfig,
};
use metering_service::middleware::LogSeverity;
use metering_service::models::Plan;
use metering_service::services::{MemoryStore, MeteringStore, RenewalPolicy};
use metering_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};
use uuid::Uuid;

pub const ADMIN_ID: &str = "acct-admin";
pub const ADMIN_EMAIL: &str = "ops@example.com";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,metering_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_plan(key: &str, grant: i64, sort_order: i32) -> Plan {
    Plan {
        plan_key: key.to_string(),
        billing_ref: None,
        display_name: key.to_string(),
        base_credit_grant: grant,
        is_active: true,
        sort_order,
        price_cents: 0,
        currency: "usd".to_string(),
        features: serde_json::json!([]),
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

pub fn test_config(renewal_policy: RenewalPolicy) -> MeteringConfig {
    MeteringConfig {
        common: CommonConfig { port: 0 },
        service_name: "metering-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            // Unused: tests run over the in-memory store.
            url: "postgres://unused".to_string(),
            max_connections: 2,
            min_connections: 1,
        },
        admin: AdminConfig {
            account_ids: vec![ADMIN_ID.to_string()],
            emails: vec![ADMIN_EMAIL.to_string()],
        },
        observe: ObserveConfig {
            logging_enabled: true,
            min_severity: LogSeverity::Warn,
            min_status: 400,
        },
        cache: CacheConfig {
            settings_ttl_seconds: 300,
            max_entries: 64,
            cleanup_interval_seconds: 60,
        },
        renewal_policy,
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
}

/// Spawn a test application over an in-memory store seeded with the default
/// plans, and wait until it accepts requests.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(RenewalPolicy::Reset).await
}

pub async fn spawn_app_with(renewal_policy: RenewalPolicy) -> TestApp {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    store.insert_plan(test_plan("free", 25, 0));
    store.insert_plan(test_plan("pro", 500, 1));

    let app = Application::with_store(test_config(renewal_policy), store.clone())
        .await
        .expect("Failed to build application");

    let address = format!("http://127.0.0.1:{}", app.port());

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();

    // Wait for the server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(resp) if resp.status().is_success() => break,
            _ if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            other => panic!("Server did not become ready: {:?}", other),
        }
    }

    TestApp {
        address,
        client,
        store,
    }
}

impl TestApp {
    /// Create an account directly in the store, as the identity layer would
    /// on first authenticated access.
    pub async fn seed_account(&self, external_id: &str, email: &str) -> Uuid {
        let store: Arc<dyn MeteringStore> = self.store.clone();
        store
            .get_or_create_account(external_id, email)
            .await
            .expect("Failed to seed account")
            .account_id
    }

    pub async fn get_balance(&self, caller_id: &str, caller_email: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/credits/balance", self.address))
            .header("x-caller-id", caller_id)
            .header("x-caller-email", caller_email)
            .send()
            .await
            .expect("Failed to send balance request")
    }

    pub async fn debit(
        &self,
        caller_id: &str,
        caller_email: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/credits/debit", self.address))
            .header("x-caller-id", caller_id)
            .header("x-caller-email", caller_email)
            .json(body)
            .send()
            .await
            .expect("Failed to send debit request")
    }

    pub async fn admin_get_settings(&self) -> reqwest::Response {
        self.client
            .get(format!("{}/settings/effective", self.address))
            .header("x-caller-id", ADMIN_ID)
            .header("x-caller-email", ADMIN_EMAIL)
            .send()
            .await
            .expect("Failed to send settings request")
    }

    pub async fn admin_put_settings(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(format!("{}/settings/effective", self.address))
            .header("x-caller-id", ADMIN_ID)
            .header("x-caller-email", ADMIN_EMAIL)
            .json(body)
            .send()
            .await
            .expect("Failed to send settings update")
    }

    pub async fn admin_grant(&self, account_id: Uuid, amount: i64) -> reqwest::Response {
        self.client
            .post(format!("{}/admin/credits/grant", self.address))
            .header("x-caller-id", ADMIN_ID)
            .header("x-caller-email", ADMIN_EMAIL)
            .json(&serde_json::json!({
                "accountId": account_id,
                "amount": amount,
                "reason": "test grant"
            }))
            .send()
            .await
            .expect("Failed to send grant request")
    }

    pub async fn admin_sync(&self, account_id: Uuid, plan_key: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/admin/credits/sync", self.address))
            .header("x-caller-id", ADMIN_ID)
            .header("x-caller-email", ADMIN_EMAIL)
            .json(&serde_json::json!({
                "accountId": account_id,
                "planKey": plan_key
            }))
            .send()
            .await
            .expect("Failed to send sync request")
    }
}
