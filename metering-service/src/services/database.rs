//! Postgres implementation of the storage contract.

use crate::models::{
    Account, CreditBalance, FeatureCostOverride, Plan, PlanCreditOverride, RecordUsage,
    UsageRecord,
};
use crate::services::error::MeteringError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::MeteringStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "metering-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, MeteringError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), MeteringError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl MeteringStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MeteringError::Storage(anyhow::anyhow!("Health check failed: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self), fields(external_id = %external_id))]
    async fn get_or_create_account(
        &self,
        external_id: &str,
        email: &str,
    ) -> Result<Account, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_or_create_account"])
            .start_timer();

        // A no-op conflict update makes the insert return the existing row,
        // so a lost race still yields the winner's account.
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (account_id, external_id, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO UPDATE SET external_id = accounts.external_id
            RETURNING account_id, external_id, email, plan_key, is_active, created_utc, deactivated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(external_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to get or create account: {}", e))
        })?;

        timer.observe_duration();

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, external_id, email, plan_key, is_active, created_utc, deactivated_utc
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to find account: {}", e)))?;

        timer.observe_duration();

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %account_id, plan_key = %plan_key))]
    async fn set_account_plan(
        &self,
        account_id: Uuid,
        plan_key: &str,
    ) -> Result<(), MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_account_plan"])
            .start_timer();

        let result = sqlx::query("UPDATE accounts SET plan_key = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(plan_key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MeteringError::Storage(anyhow::anyhow!("Failed to set account plan: {}", e))
            })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(MeteringError::Storage(anyhow::anyhow!(
                "account {} not found",
                account_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn get_or_create_balance(
        &self,
        account_id: Uuid,
        initial_credits: i64,
    ) -> Result<CreditBalance, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_or_create_balance"])
            .start_timer();

        let balance = sqlx::query_as::<_, CreditBalance>(
            r#"
            INSERT INTO credit_balances (account_id, credits_remaining)
            VALUES ($1, GREATEST($2, 0))
            ON CONFLICT (account_id) DO UPDATE SET account_id = credit_balances.account_id
            RETURNING account_id, credits_remaining, last_synced_utc, updated_utc
            "#,
        )
        .bind(account_id)
        .bind(initial_credits)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to get or create balance: {}", e))
        })?;

        timer.observe_duration();

        Ok(balance)
    }

    #[instrument(skip(self), fields(account_id = %account_id, amount = amount))]
    async fn debit_if_sufficient(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<Option<CreditBalance>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["debit_if_sufficient"])
            .start_timer();

        // Conditional single-statement decrement: the sufficiency check and
        // the write are one atomic storage operation, so concurrent debits
        // cannot jointly overdraw.
        let balance = sqlx::query_as::<_, CreditBalance>(
            r#"
            UPDATE credit_balances
            SET credits_remaining = credits_remaining - $2, updated_utc = now()
            WHERE account_id = $1 AND credits_remaining >= $2
            RETURNING account_id, credits_remaining, last_synced_utc, updated_utc
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to debit balance: {}", e)))?;

        timer.observe_duration();

        Ok(balance)
    }

    #[instrument(skip(self), fields(account_id = %account_id, amount = amount))]
    async fn credit_balance(
        &self,
        account_id: Uuid,
        amount: i64,
    ) -> Result<CreditBalance, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["credit_balance"])
            .start_timer();

        let balance = sqlx::query_as::<_, CreditBalance>(
            r#"
            INSERT INTO credit_balances (account_id, credits_remaining)
            VALUES ($1, $2)
            ON CONFLICT (account_id) DO UPDATE
            SET credits_remaining = credit_balances.credits_remaining + EXCLUDED.credits_remaining,
                updated_utc = now()
            RETURNING account_id, credits_remaining, last_synced_utc, updated_utc
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to credit balance: {}", e))
        })?;

        timer.observe_duration();

        Ok(balance)
    }

    #[instrument(skip(self), fields(account_id = %account_id, credits = credits))]
    async fn set_balance_synced(
        &self,
        account_id: Uuid,
        credits: i64,
        synced_utc: DateTime<Utc>,
    ) -> Result<CreditBalance, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_balance_synced"])
            .start_timer();

        let balance = sqlx::query_as::<_, CreditBalance>(
            r#"
            INSERT INTO credit_balances (account_id, credits_remaining, last_synced_utc)
            VALUES ($1, GREATEST($2, 0), $3)
            ON CONFLICT (account_id) DO UPDATE
            SET credits_remaining = GREATEST(EXCLUDED.credits_remaining, 0),
                last_synced_utc = EXCLUDED.last_synced_utc,
                updated_utc = now()
            RETURNING account_id, credits_remaining, last_synced_utc, updated_utc
            "#,
        )
        .bind(account_id)
        .bind(credits)
        .bind(synced_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to sync balance: {}", e)))?;

        timer.observe_duration();

        Ok(balance)
    }

    #[instrument(skip(self))]
    async fn list_plans(&self) -> Result<Vec<Plan>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_plans"])
            .start_timer();

        let plans = sqlx::query_as::<_, Plan>(
            r#"
            SELECT plan_key, billing_ref, display_name, base_credit_grant, is_active, sort_order,
                   price_cents, currency, features, created_utc, updated_utc
            FROM plans
            ORDER BY sort_order
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to list plans: {}", e)))?;

        timer.observe_duration();

        Ok(plans)
    }

    #[instrument(skip(self), fields(plan_key = %plan_key))]
    async fn find_plan(&self, plan_key: &str) -> Result<Option<Plan>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT plan_key, billing_ref, display_name, base_credit_grant, is_active, sort_order,
                   price_cents, currency, features, created_utc, updated_utc
            FROM plans
            WHERE plan_key = $1
            "#,
        )
        .bind(plan_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MeteringError::Storage(anyhow::anyhow!("Failed to find plan: {}", e)))?;

        timer.observe_duration();

        Ok(plan)
    }

    #[instrument(skip(self))]
    async fn list_feature_cost_overrides(
        &self,
    ) -> Result<Vec<FeatureCostOverride>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_feature_cost_overrides"])
            .start_timer();

        let overrides = sqlx::query_as::<_, FeatureCostOverride>(
            "SELECT operation_key, cost, updated_utc FROM feature_cost_overrides",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to list cost overrides: {}", e))
        })?;

        timer.observe_duration();

        Ok(overrides)
    }

    #[instrument(skip(self), fields(operation_key = %operation_key, cost = cost))]
    async fn upsert_feature_cost_override(
        &self,
        operation_key: &str,
        cost: i64,
    ) -> Result<(), MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_feature_cost_override"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO feature_cost_overrides (operation_key, cost)
            VALUES ($1, $2)
            ON CONFLICT (operation_key) DO UPDATE
            SET cost = EXCLUDED.cost, updated_utc = now()
            "#,
        )
        .bind(operation_key)
        .bind(cost)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to upsert cost override: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_plan_credit_overrides(
        &self,
    ) -> Result<Vec<PlanCreditOverride>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_plan_credit_overrides"])
            .start_timer();

        let overrides = sqlx::query_as::<_, PlanCreditOverride>(
            "SELECT plan_key, credits, updated_utc FROM plan_credit_overrides",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to list plan overrides: {}", e))
        })?;

        timer.observe_duration();

        Ok(overrides)
    }

    #[instrument(skip(self), fields(plan_key = %plan_key, credits = credits))]
    async fn upsert_plan_credit_override(
        &self,
        plan_key: &str,
        credits: i64,
    ) -> Result<(), MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_plan_credit_override"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO plan_credit_overrides (plan_key, credits)
            VALUES ($1, $2)
            ON CONFLICT (plan_key) DO UPDATE
            SET credits = EXCLUDED.credits, updated_utc = now()
            "#,
        )
        .bind(plan_key)
        .bind(credits)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to upsert plan override: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self, input), fields(account_id = %input.account_id, operation_key = %input.operation_key))]
    async fn append_usage_record(
        &self,
        input: RecordUsage,
    ) -> Result<UsageRecord, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_usage_record"])
            .start_timer();

        let record = sqlx::query_as::<_, UsageRecord>(
            r#"
            INSERT INTO usage_records (record_id, account_id, operation_key, credits_used, quantity, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING record_id, account_id, operation_key, credits_used, quantity, detail, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.account_id)
        .bind(&input.operation_key)
        .bind(input.credits_used)
        .bind(input.quantity)
        .bind(&input.detail)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to append usage record: {}", e))
        })?;

        timer.observe_duration();

        Ok(record)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn list_usage_records(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, MeteringError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_usage_records"])
            .start_timer();

        let limit = limit.clamp(1, 500);
        let records = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT record_id, account_id, operation_key, credits_used, quantity, detail, created_utc
            FROM usage_records
            WHERE account_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            MeteringError::Storage(anyhow::anyhow!("Failed to list usage records: {}", e))
        })?;

        timer.observe_duration();

        Ok(records)
    }
}
