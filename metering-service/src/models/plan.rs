//! Purchasable plan tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A purchasable tier. Administrator-managed and read-mostly; the set of
/// `plan_key` values present in storage is the closed key set against which
/// plan-credit overrides are validated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub plan_key: String,
    pub billing_ref: Option<String>,
    pub display_name: String,
    pub base_credit_grant: i64,
    pub is_active: bool,
    pub sort_order: i32,
    pub price_cents: i64,
    pub currency: String,
    /// Feature-description list, stored as a JSON array of strings.
    pub features: serde_json::Value,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
