//! Request/response DTOs for the HTTP surface.

use crate::models::{CreditBalance, Plan, UsageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Effective settings, the overlay of overrides onto defaults.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettingsResponse {
    pub feature_costs: BTreeMap<String, i64>,
    pub plan_credits: BTreeMap<String, i64>,
}

/// Settings override write. Either map may be omitted; submitted keys are
/// validated against the closed key sets before anything is persisted.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSettingsRequest {
    pub feature_costs: BTreeMap<String, i64>,
    pub plan_credits: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub credits_remaining: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl From<CreditBalance> for BalanceResponse {
    fn from(balance: CreditBalance) -> Self {
        Self {
            credits_remaining: balance.credits_remaining,
            last_synced_at: balance.last_synced_utc,
        }
    }
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    #[validate(length(min = 1, message = "Operation key is required"))]
    pub operation: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitResponse {
    pub operation: String,
    pub credits_used: i64,
    pub credits_remaining: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsRequest {
    pub account_id: Uuid,
    pub amount: i64,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlanRequest {
    pub account_id: Uuid,
    #[validate(length(min = 1, message = "Plan key is required"))]
    pub plan_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub plan_key: String,
    pub display_name: String,
    pub base_credit_grant: i64,
    pub price_cents: i64,
    pub currency: String,
    pub features: serde_json::Value,
    pub sort_order: i32,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            plan_key: plan.plan_key,
            display_name: plan.display_name,
            base_credit_grant: plan.base_credit_grant,
            price_cents: plan.price_cents,
            currency: plan.currency,
            features: plan.features,
            sort_order: plan.sort_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordResponse {
    pub record_id: Uuid,
    pub operation: String,
    pub credits_used: i64,
    pub quantity: i64,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<UsageRecord> for UsageRecordResponse {
    fn from(record: UsageRecord) -> Self {
        Self {
            record_id: record.record_id,
            operation: record.operation_key,
            credits_used: record.credits_used,
            quantity: record.quantity,
            detail: record.detail,
            created_at: record.created_utc,
        }
    }
}
