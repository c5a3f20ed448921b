//! Application startup and lifecycle management.

use crate::config::MeteringConfig;
use crate::services::{
    init_metrics, AdminGate, CreditLedger, MeteringStore, PgStore, SettingsCache,
    SettingsResolver,
};
use crate::{build_router, AppState};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against PostgreSQL, running migrations.
    pub async fn build(config: MeteringConfig) -> Result<Self, AppError> {
        let store = PgStore::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            AppError::from(e)
        })?;

        store.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            AppError::from(e)
        })?;

        Self::with_store(config, Arc::new(store)).await
    }

    /// Build the application over an injected store. Tests and local runs
    /// use this with `MemoryStore`.
    pub async fn with_store(
        config: MeteringConfig,
        store: Arc<dyn MeteringStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let cache = Arc::new(SettingsCache::new(config.cache.max_entries));
        let settings = Arc::new(SettingsResolver::new(
            store.clone(),
            cache.clone(),
            Duration::from_secs(config.cache.settings_ttl_seconds),
        ));
        let ledger = Arc::new(CreditLedger::new(
            store.clone(),
            settings.clone(),
            config.renewal_policy,
        ));
        let admin_gate = Arc::new(AdminGate::new(
            &config.admin.account_ids,
            &config.admin.emails,
        ));

        let state = AppState {
            config: config.clone(),
            store,
            cache,
            settings,
            ledger,
            admin_gate,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Metering service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        // Periodic cache sweep, so write-once keys expire without a read.
        let cache = self.state.cache.clone();
        let sweep_interval =
            Duration::from_secs(self.state.config.cache.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.cleanup();
            }
        });

        let router = build_router(self.state.clone());

        tracing::info!(
            service = "metering-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
