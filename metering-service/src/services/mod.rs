//! Services module for metering-service.

pub mod authz;
pub mod cache;
pub mod database;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod settings;
pub mod store;

pub use authz::{AdminGate, CallerIdentity};
pub use cache::TtlCache;
pub use database::PgStore;
pub use error::MeteringError;
pub use ledger::{CreditLedger, DebitOutcome, RenewalPolicy};
pub use metrics::{get_metrics, init_metrics};
pub use settings::{
    SettingsCache, SettingsResolver, FEATURE_COSTS_CACHE_KEY, PLAN_CREDITS_CACHE_KEY,
};
pub use store::{MemoryStore, MeteringStore};
