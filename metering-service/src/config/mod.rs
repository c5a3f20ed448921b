use crate::middleware::observe::{LogSeverity, ObservePolicy};
use crate::services::ledger::RenewalPolicy;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct MeteringConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub observe: ObserveConfig,
    pub cache: CacheConfig,
    pub renewal_policy: RenewalPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Allow-lists for the admin authorization gate.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub account_ids: Vec<String>,
    pub emails: Vec<String>,
}

/// Verbosity policy for the request instrumentation wrapper.
#[derive(Debug, Clone)]
pub struct ObserveConfig {
    pub logging_enabled: bool,
    pub min_severity: LogSeverity,
    pub min_status: u16,
}

impl ObserveConfig {
    pub fn policy(&self) -> ObservePolicy {
        ObservePolicy {
            enabled: self.logging_enabled,
            min_severity: self.min_severity,
            min_status: self.min_status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub settings_ttl_seconds: u64,
    pub max_entries: usize,
    pub cleanup_interval_seconds: u64,
}

impl MeteringConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let config = MeteringConfig {
            common,
            service_name: get_env("SERVICE_NAME", Some("metering-service"))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1")?,
            },
            admin: AdminConfig {
                account_ids: split_csv(&get_env("ADMIN_ACCOUNT_IDS", Some(""))?),
                emails: split_csv(&get_env("ADMIN_EMAILS", Some(""))?),
            },
            observe: ObserveConfig {
                logging_enabled: parse_env("API_LOGGING_ENABLED", "true")?,
                min_severity: get_env("API_LOG_MIN_SEVERITY", Some("warn"))?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                min_status: parse_env("API_LOG_MIN_STATUS", "400")?,
            },
            cache: CacheConfig {
                settings_ttl_seconds: parse_env("SETTINGS_CACHE_TTL_SECONDS", "300")?,
                max_entries: parse_env("CACHE_MAX_ENTRIES", "256")?,
                cleanup_interval_seconds: parse_env("CACHE_CLEANUP_INTERVAL_SECONDS", "60")?,
            },
            renewal_policy: get_env("RENEWAL_POLICY", Some("reset"))?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.cache.settings_ttl_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SETTINGS_CACHE_TTL_SECONDS must be greater than 0"
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CACHE_MAX_ENTRIES must be greater than 0"
            )));
        }

        if self.admin.account_ids.is_empty() && self.admin.emails.is_empty() {
            tracing::warn!(
                "No admin allow-list configured; every privileged request will be rejected"
            );
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default))?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
