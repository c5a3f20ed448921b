//! Append-only usage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per successful billable operation. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub record_id: Uuid,
    pub account_id: Uuid,
    pub operation_key: String,
    pub credits_used: i64,
    pub quantity: i64,
    pub detail: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

/// Input for appending a usage record.
#[derive(Debug, Clone)]
pub struct RecordUsage {
    pub account_id: Uuid,
    pub operation_key: String,
    pub credits_used: i64,
    pub quantity: i64,
    pub detail: Option<serde_json::Value>,
}
