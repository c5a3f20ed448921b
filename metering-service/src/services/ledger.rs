//! Credit ledger: the single owner of balance mutation.

use crate::models::{Account, CreditBalance, OperationType, RecordUsage};
use crate::services::error::MeteringError;
use crate::services::metrics::{record_credits_charged, record_debit, record_error, record_grant};
use crate::services::settings::SettingsResolver;
use crate::services::store::MeteringStore;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// What a plan renewal does to an existing balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewalPolicy {
    /// Balance becomes the plan's effective grant.
    #[default]
    Reset,
    /// Balance is raised to the grant if below it, never lowered.
    TopUp,
}

impl std::str::FromStr for RenewalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reset" => Ok(RenewalPolicy::Reset),
            "topup" => Ok(RenewalPolicy::TopUp),
            _ => Err(format!("Invalid renewal policy: {}", s)),
        }
    }
}

/// Result of a successful debit.
#[derive(Debug, Clone)]
pub struct DebitOutcome {
    pub balance: CreditBalance,
    pub operation: OperationType,
    pub credits_used: i64,
}

/// Owns all CreditBalance mutation. Mutations for one account serialize on a
/// per-account lock, and the storage decrement is itself conditional, so
/// concurrent debits can never jointly overdraw a balance.
pub struct CreditLedger {
    store: Arc<dyn MeteringStore>,
    settings: Arc<SettingsResolver>,
    renewal_policy: RenewalPolicy,
    account_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CreditLedger {
    pub fn new(
        store: Arc<dyn MeteringStore>,
        settings: Arc<SettingsResolver>,
        renewal_policy: RenewalPolicy,
    ) -> Self {
        Self {
            store,
            settings,
            renewal_policy,
            account_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(account_id)
            .or_insert_with(Default::default)
            .value()
            .clone()
    }

    /// Seed value for a lazily created balance row: the effective grant of
    /// the account's plan, or zero when the account has no plan or the plan
    /// is absent from the effective table.
    async fn initial_grant(&self, account: &Account) -> Result<i64, MeteringError> {
        match &account.plan_key {
            None => Ok(0),
            Some(key) => {
                let credits = self.settings.effective_plan_credits().await?;
                Ok(credits.get(key).copied().unwrap_or(0))
            }
        }
    }

    /// Current balance, creating the row on first read.
    pub async fn balance(&self, account: &Account) -> Result<CreditBalance, MeteringError> {
        let initial = self.initial_grant(account).await?;
        self.store
            .get_or_create_balance(account.account_id, initial)
            .await
    }

    /// Charge `operation_key` × `quantity` against the account. Fails with
    /// `InsufficientCredits` and no partial deduction when the balance cannot
    /// cover the full amount; on success appends exactly one usage record.
    pub async fn debit(
        &self,
        account: &Account,
        operation_key: &str,
        quantity: i64,
    ) -> Result<DebitOutcome, MeteringError> {
        let operation = self.settings.operation_type(operation_key)?;
        if quantity < 1 {
            return Err(MeteringError::InvalidAmount(quantity));
        }

        let costs = self.settings.effective_feature_costs().await?;
        let unit_cost = costs.get(operation.as_key()).copied().ok_or_else(|| {
            MeteringError::ConfigurationGap(format!(
                "no effective cost for operation '{}'",
                operation.as_key()
            ))
        })?;
        let amount = unit_cost
            .checked_mul(quantity)
            .ok_or(MeteringError::InvalidAmount(quantity))?;

        let lock = self.lock_for(account.account_id);
        let _guard = lock.lock().await;

        // Make sure the row exists before the conditional decrement so a
        // brand-new account fails with "insufficient", not "missing".
        let initial = self.initial_grant(account).await?;
        self.store
            .get_or_create_balance(account.account_id, initial)
            .await?;

        match self
            .store
            .debit_if_sufficient(account.account_id, amount)
            .await?
        {
            Some(balance) => {
                self.store
                    .append_usage_record(RecordUsage {
                        account_id: account.account_id,
                        operation_key: operation.as_key().to_string(),
                        credits_used: amount,
                        quantity,
                        detail: Some(serde_json::json!({ "unit_cost": unit_cost })),
                    })
                    .await?;

                record_debit(operation.as_key(), "success");
                record_credits_charged(operation.as_key(), amount);
                tracing::info!(
                    account_id = %account.account_id,
                    operation = %operation,
                    credits_used = amount,
                    credits_remaining = balance.credits_remaining,
                    "Credits debited"
                );

                Ok(DebitOutcome {
                    balance,
                    operation,
                    credits_used: amount,
                })
            }
            None => {
                let current = self
                    .store
                    .get_or_create_balance(account.account_id, 0)
                    .await?;
                record_debit(operation.as_key(), "insufficient");
                record_error("insufficient_credits", operation.as_key());
                Err(MeteringError::InsufficientCredits {
                    required: amount,
                    available: current.credits_remaining,
                })
            }
        }
    }

    /// Grant credits (admin grant, refund, promotion). Rejects non-positive
    /// amounts with `InvalidAmount`.
    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> Result<CreditBalance, MeteringError> {
        if amount <= 0 {
            return Err(MeteringError::InvalidAmount(amount));
        }
        if self.store.find_account(account_id).await?.is_none() {
            return Err(MeteringError::UnknownAccount(account_id));
        }

        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let balance = self.store.credit_balance(account_id, amount).await?;

        record_grant("admin_grant");
        tracing::info!(
            account_id = %account_id,
            amount = amount,
            reason = %reason,
            credits_remaining = balance.credits_remaining,
            "Credits granted"
        );

        Ok(balance)
    }

    /// Reconcile the balance with a plan's effective grant on renewal or
    /// plan change, per the configured renewal policy, and stamp the sync
    /// time.
    pub async fn sync_from_plan(
        &self,
        account_id: Uuid,
        plan_key: &str,
    ) -> Result<CreditBalance, MeteringError> {
        if self.store.find_account(account_id).await?.is_none() {
            return Err(MeteringError::UnknownAccount(account_id));
        }
        if self.store.find_plan(plan_key).await?.is_none() {
            return Err(MeteringError::UnknownPlan(plan_key.to_string()));
        }

        let grants = self.settings.effective_plan_credits().await?;
        let grant = grants.get(plan_key).copied().ok_or_else(|| {
            MeteringError::ConfigurationGap(format!(
                "no effective credit grant for plan '{}'",
                plan_key
            ))
        })?;

        let lock = self.lock_for(account_id);
        let _guard = lock.lock().await;

        let current = self.store.get_or_create_balance(account_id, 0).await?;
        let credits = match self.renewal_policy {
            RenewalPolicy::Reset => grant,
            RenewalPolicy::TopUp => current.credits_remaining.max(grant),
        };

        self.store.set_account_plan(account_id, plan_key).await?;
        let balance = self
            .store
            .set_balance_synced(account_id, credits, Utc::now())
            .await?;

        record_grant("plan_sync");
        tracing::info!(
            account_id = %account_id,
            plan_key = %plan_key,
            policy = ?self.renewal_policy,
            credits_remaining = balance.credits_remaining,
            "Balance synchronized from plan"
        );

        Ok(balance)
    }
}
