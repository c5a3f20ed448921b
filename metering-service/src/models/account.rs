//! Subscriber account and credit balance models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A subscriber account.
///
/// `external_id` is the identity-provider subject, unique and immutable after
/// creation. Accounts are created lazily on first authenticated access and
/// are never hard-deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub external_id: String,
    pub email: String,
    pub plan_key: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub deactivated_utc: Option<DateTime<Utc>>,
}

/// Credit balance row, exactly one per account.
///
/// `credits_remaining` is never negative; all mutation goes through the
/// credit ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditBalance {
    pub account_id: Uuid,
    pub credits_remaining: i64,
    pub last_synced_utc: Option<DateTime<Utc>>,
    pub updated_utc: DateTime<Utc>,
}
