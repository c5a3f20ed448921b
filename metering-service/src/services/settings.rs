//! Effective-settings resolution.
//!
//! Overlays administrator override rows onto compiled-in defaults (feature
//! costs) and plan base grants (plan credits). Resolved tables are cached
//! under fixed keys; any override write deletes those keys synchronously so
//! an administrator's next read observes the new value without waiting out
//! the TTL.

use crate::models::OperationType;
use crate::services::cache::TtlCache;
use crate::services::error::MeteringError;
use crate::services::metrics::record_cache_lookup;
use crate::services::store::MeteringStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub type SettingsCache = TtlCache<BTreeMap<String, i64>>;

pub const FEATURE_COSTS_CACHE_KEY: &str = "settings:feature_costs";
pub const PLAN_CREDITS_CACHE_KEY: &str = "settings:plan_credits";

pub struct SettingsResolver {
    store: Arc<dyn MeteringStore>,
    cache: Arc<SettingsCache>,
    ttl: Duration,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn MeteringStore>, cache: Arc<SettingsCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Convert a feature key into its canonical operation type. Keys outside
    /// the closed set are a hard error, never a silent default.
    pub fn operation_type(&self, key: &str) -> Result<OperationType, MeteringError> {
        OperationType::from_key(key)
            .ok_or_else(|| MeteringError::UnrecognizedOperationType(key.to_string()))
    }

    /// Effective cost for every known operation key: override row wins,
    /// compiled default otherwise. Every key appears in the result.
    pub async fn effective_feature_costs(&self) -> Result<BTreeMap<String, i64>, MeteringError> {
        if let Some(table) = self.cache.get(FEATURE_COSTS_CACHE_KEY) {
            record_cache_lookup(FEATURE_COSTS_CACHE_KEY, true);
            return Ok(table);
        }
        record_cache_lookup(FEATURE_COSTS_CACHE_KEY, false);

        let mut table = BTreeMap::new();
        for op in OperationType::ALL {
            table.insert(op.as_key().to_string(), op.default_cost());
        }

        for row in self.store.list_feature_cost_overrides().await? {
            // An override row outside the closed set means the override table
            // no longer matches the code: surface it, don't guess.
            if OperationType::from_key(&row.operation_key).is_none() {
                return Err(MeteringError::ConfigurationGap(format!(
                    "cost override references unknown operation key '{}'",
                    row.operation_key
                )));
            }
            table.insert(row.operation_key, row.cost);
        }

        self.cache.set(FEATURE_COSTS_CACHE_KEY, table.clone(), self.ttl);
        Ok(table)
    }

    /// Effective credit grant for every known plan: override row wins, the
    /// plan's base grant otherwise.
    pub async fn effective_plan_credits(&self) -> Result<BTreeMap<String, i64>, MeteringError> {
        if let Some(table) = self.cache.get(PLAN_CREDITS_CACHE_KEY) {
            record_cache_lookup(PLAN_CREDITS_CACHE_KEY, true);
            return Ok(table);
        }
        record_cache_lookup(PLAN_CREDITS_CACHE_KEY, false);

        let mut table = BTreeMap::new();
        for plan in self.store.list_plans().await? {
            table.insert(plan.plan_key, plan.base_credit_grant);
        }

        for row in self.store.list_plan_credit_overrides().await? {
            if !table.contains_key(&row.plan_key) {
                return Err(MeteringError::ConfigurationGap(format!(
                    "credit override references unknown plan '{}'",
                    row.plan_key
                )));
            }
            table.insert(row.plan_key, row.credits);
        }

        self.cache.set(PLAN_CREDITS_CACHE_KEY, table.clone(), self.ttl);
        Ok(table)
    }

    /// Validate and persist administrator overrides, then invalidate the
    /// cached tables. Validation happens for the whole request before the
    /// first write, so a bad key leaves storage untouched.
    pub async fn apply_overrides(
        &self,
        feature_costs: &BTreeMap<String, i64>,
        plan_credits: &BTreeMap<String, i64>,
    ) -> Result<(), MeteringError> {
        for (key, cost) in feature_costs {
            self.operation_type(key)?;
            if *cost < 0 {
                return Err(MeteringError::InvalidAmount(*cost));
            }
        }

        if !plan_credits.is_empty() {
            let known: Vec<String> = self
                .store
                .list_plans()
                .await?
                .into_iter()
                .map(|p| p.plan_key)
                .collect();
            for (key, credits) in plan_credits {
                if !known.contains(key) {
                    return Err(MeteringError::UnknownPlan(key.clone()));
                }
                if *credits < 0 {
                    return Err(MeteringError::InvalidAmount(*credits));
                }
            }
        }

        for (key, cost) in feature_costs {
            self.store.upsert_feature_cost_override(key, *cost).await?;
        }
        for (key, credits) in plan_credits {
            self.store.upsert_plan_credit_override(key, *credits).await?;
        }

        // Synchronous invalidation: the next read resolves fresh tables.
        self.cache.delete(FEATURE_COSTS_CACHE_KEY);
        self.cache.delete(PLAN_CREDITS_CACHE_KEY);

        tracing::info!(
            feature_overrides = feature_costs.len(),
            plan_overrides = plan_credits.len(),
            "Settings overrides applied, cache invalidated"
        );

        Ok(())
    }
}
