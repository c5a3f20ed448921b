//! Storage contract for the metering service.
//!
//! The durable store is an external collaborator reached only through this
//! narrow trait. `PgStore` (services::database) is the production
//! implementation; `MemoryStore` here backs the test suite and local runs
//! without a database, honoring the same atomicity contract.

use crate::models::{
    Account, CreditBalance, FeatureCostOverride, Plan, PlanCreditOverride, RecordUsage,
    UsageRecord,
};
use crate::services::error::MeteringError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait MeteringStore: Send + Sync {
    async fn health_check(&self) -> Result<(), MeteringError>;

    /// Atomic get-or-create keyed by the identity-provider subject. A lost
    /// race against a concurrent creator must return the winner's row.
    async fn get_or_create_account(
        &self,
        external_id: &str,
        email: &str,
    ) -> Result<Account, MeteringError>;

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, MeteringError>;

    async fn set_account_plan(
        &self,
        account_id: Uuid,
        plan_key: &str,
    ) -> Result<(), MeteringError>;

    /// Atomic get-or-create of the balance row, seeded with
    /// `initial_credits` only when the row does not exist yet.
    async fn get_or_create_balance(
        &self,
        account_id: Uuid,
        initial_credits: i64,
    ) -> Result<CreditBalance, MeteringError>;

    /// Decrement-if-sufficient. Returns the updated balance, or `None` when
    /// the balance would go negative (in which case nothing is applied).
    async fn debit_if_sufficient(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<Option<CreditBalance>, MeteringError>;

    /// Unconditional increment; creates the row when absent.
    async fn credit_balance(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<CreditBalance, MeteringError>;

    /// Set the balance to an absolute value and stamp the sync time.
    async fn set_balance_synced(
        &self,
        account_id: Uuid,
        credits: i64,
        synced_utc: DateTime<Utc>,
    ) -> Result<CreditBalance, MeteringError>;

    async fn list_plans(&self) -> Result<Vec<Plan>, MeteringError>;

    async fn find_plan(&self, plan_key: &str) -> Result<Option<Plan>, MeteringError>;

    async fn list_feature_cost_overrides(
        &self,
    ) -> Result<Vec<FeatureCostOverride>, MeteringError>;

    async fn upsert_feature_cost_override(
        &self,
        operation_key: &str,
        cost: i64,
    ) -> Result<(), MeteringError>;

    async fn list_plan_credit_overrides(&self) -> Result<Vec<PlanCreditOverride>, MeteringError>;

    async fn upsert_plan_credit_override(
        &self,
        plan_key: &str,
        credits: i64,
    ) -> Result<(), MeteringError>;

    async fn append_usage_record(
        &self,
        input: RecordUsage,
    ) -> Result<UsageRecord, MeteringError>;

    async fn list_usage_records(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, MeteringError>;
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<Uuid, Account>,
    accounts_by_external: HashMap<String, Uuid>,
    balances: HashMap<Uuid, CreditBalance>,
    plans: BTreeMap<String, Plan>,
    feature_overrides: BTreeMap<String, FeatureCostOverride>,
    plan_overrides: BTreeMap<String, PlanCreditOverride>,
    usage: Vec<UsageRecord>,
}

/// Mutex-guarded in-memory implementation of the storage contract. One lock
/// covers every operation, so conditional debits are atomic here exactly as
/// they are in SQL.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a plan row. Intended for tests and local development; plan
    /// provisioning in production happens through migrations.
    pub fn insert_plan(&self, plan: Plan) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.plans.insert(plan.plan_key.clone(), plan);
    }
}

#[async_trait]
impl MeteringStore for MemoryStore {
    async fn health_check(&self) -> Result<(), MeteringError> {
        Ok(())
    }

    async fn get_or_create_account(
        &self,
        external_id: &str,
        email: &str,
    ) -> Result<Account, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        if let Some(account_id) = inner.accounts_by_external.get(external_id) {
            let account = inner
                .accounts
                .get(account_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("account index out of sync"))?;
            return Ok(account);
        }

        let account = Account {
            account_id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            email: email.to_string(),
            plan_key: None,
            is_active: true,
            created_utc: Utc::now(),
            deactivated_utc: None,
        };
        inner
            .accounts_by_external
            .insert(external_id.to_string(), account.account_id);
        inner.accounts.insert(account.account_id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.accounts.get(&account_id).cloned())
    }

    async fn set_account_plan(
        &self,
        account_id: Uuid,
        plan_key: &str,
    ) -> Result<(), MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow::anyhow!("account {} not found", account_id))?;
        account.plan_key = Some(plan_key.to_string());
        Ok(())
    }

    async fn get_or_create_balance(
        &self,
        account_id: Uuid,
        initial_credits: i64,
    ) -> Result<CreditBalance, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let balance = inner
            .balances
            .entry(account_id)
            .or_insert_with(|| CreditBalance {
                account_id,
                credits_remaining: initial_credits.max(0),
                last_synced_utc: None,
                updated_utc: Utc::now(),
            });
        Ok(balance.clone())
    }

    async fn debit_if_sufficient(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<Option<CreditBalance>, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let balance = match inner.balances.get_mut(&account_id) {
            Some(b) => b,
            None => return Ok(None),
        };
        if balance.credits_remaining < amount {
            return Ok(None);
        }
        balance.credits_remaining -= amount;
        balance.updated_utc = Utc::now();
        Ok(Some(balance.clone()))
    }

    async fn credit_balance(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<CreditBalance, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let balance = inner
            .balances
            .entry(account_id)
            .or_insert_with(|| CreditBalance {
                account_id,
                credits_remaining: 0,
                last_synced_utc: None,
                updated_utc: Utc::now(),
            });
        balance.credits_remaining += amount;
        balance.updated_utc = Utc::now();
        Ok(balance.clone())
    }

    async fn set_balance_synced(
        &self,
        account_id: Uuid,
        credits: i64,
        synced_utc: DateTime<Utc>,
    ) -> Result<CreditBalance, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let balance = inner
            .balances
            .entry(account_id)
            .or_insert_with(|| CreditBalance {
                account_id,
                credits_remaining: 0,
                last_synced_utc: None,
                updated_utc: Utc::now(),
            });
        balance.credits_remaining = credits.max(0);
        balance.last_synced_utc = Some(synced_utc);
        balance.updated_utc = Utc::now();
        Ok(balance.clone())
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut plans: Vec<Plan> = inner.plans.values().cloned().collect();
        plans.sort_by_key(|p| p.sort_order);
        Ok(plans)
    }

    async fn find_plan(&self, plan_key: &str) -> Result<Option<Plan>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.plans.get(plan_key).cloned())
    }

    async fn list_feature_cost_overrides(
        &self,
    ) -> Result<Vec<FeatureCostOverride>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.feature_overrides.values().cloned().collect())
    }

    async fn upsert_feature_cost_override(
        &self,
        operation_key: &str,
        cost: i64,
    ) -> Result<(), MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.feature_overrides.insert(
            operation_key.to_string(),
            FeatureCostOverride {
                operation_key: operation_key.to_string(),
                cost,
                updated_utc: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_plan_credit_overrides(
        &self,
    ) -> Result<Vec<PlanCreditOverride>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.plan_overrides.values().cloned().collect())
    }

    async fn upsert_plan_credit_override(
        &self,
        plan_key: &str,
        credits: i64,
    ) -> Result<(), MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.plan_overrides.insert(
            plan_key.to_string(),
            PlanCreditOverride {
                plan_key: plan_key.to_string(),
                credits,
                updated_utc: Utc::now(),
            },
        );
        Ok(())
    }

    async fn append_usage_record(
        &self,
        input: RecordUsage,
    ) -> Result<UsageRecord, MeteringError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let record = UsageRecord {
            record_id: Uuid::new_v4(),
            account_id: input.account_id,
            operation_key: input.operation_key,
            credits_used: input.credits_used,
            quantity: input.quantity,
            detail: input.detail,
            created_utc: Utc::now(),
        };
        inner.usage.push(record.clone());
        Ok(record)
    }

    async fn list_usage_records(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, MeteringError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut records: Vec<UsageRecord> = inner
            .usage
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}
