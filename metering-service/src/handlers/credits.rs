//! Credit balance and ledger endpoints.

use crate::dtos::{
    BalanceResponse, DebitRequest, DebitResponse, GrantCreditsRequest, SyncPlanRequest,
    UsageRecordResponse,
};
use crate::services::{CallerIdentity, MeteringStore};
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

const USAGE_PAGE_SIZE: i64 = 100;

/// Current balance for the authenticated caller. The account and its balance
/// row are created lazily on first access.
pub async fn get_balance(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<BalanceResponse>, AppError> {
    let account = state
        .store
        .get_or_create_account(&identity.external_id, &identity.email)
        .await?;
    let balance = state.ledger.balance(&account).await?;

    Ok(Json(balance.into()))
}

/// Charge the caller for one billable operation.
pub async fn debit_credits(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<DebitRequest>,
) -> Result<Json<DebitResponse>, AppError> {
    req.validate()?;

    let account = state
        .store
        .get_or_create_account(&identity.external_id, &identity.email)
        .await?;
    let outcome = state
        .ledger
        .debit(&account, &req.operation, req.quantity)
        .await?;

    Ok(Json(DebitResponse {
        operation: outcome.operation.as_key().to_string(),
        credits_used: outcome.credits_used,
        credits_remaining: outcome.balance.credits_remaining,
    }))
}

/// Grant credits to an account (admin-gated).
pub async fn grant_credits(
    State(state): State<AppState>,
    Json(req): Json<GrantCreditsRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    req.validate()?;

    let balance = state
        .ledger
        .credit(req.account_id, req.amount, &req.reason)
        .await?;

    Ok(Json(balance.into()))
}

/// Reconcile an account's balance with a plan's effective grant
/// (admin-gated; used on plan purchase and renewal).
pub async fn sync_plan(
    State(state): State<AppState>,
    Json(req): Json<SyncPlanRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    req.validate()?;

    let balance = state
        .ledger
        .sync_from_plan(req.account_id, &req.plan_key)
        .await?;

    Ok(Json(balance.into()))
}

/// Recent usage records for an account (admin-gated ledger inspection).
pub async fn list_usage(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Vec<UsageRecordResponse>>, AppError> {
    if state.store.find_account(account_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Account not found: {}",
            account_id
        )));
    }

    let records = state
        .store
        .list_usage_records(account_id, USAGE_PAGE_SIZE)
        .await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}
