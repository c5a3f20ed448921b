//! Administrative settings endpoints.

use crate::dtos::{EffectiveSettingsResponse, UpdateSettingsRequest};
use crate::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Effective settings: every operation key and every known plan, with
/// administrator overrides already applied.
pub async fn get_effective_settings(
    State(state): State<AppState>,
) -> Result<Json<EffectiveSettingsResponse>, AppError> {
    let feature_costs = state.settings.effective_feature_costs().await?;
    let plan_credits = state.settings.effective_plan_credits().await?;

    Ok(Json(EffectiveSettingsResponse {
        feature_costs,
        plan_credits,
    }))
}

/// Persist administrator overrides and return the resulting effective
/// settings. The cache is invalidated before this handler reads back, so the
/// response already reflects the write.
pub async fn put_effective_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<EffectiveSettingsResponse>, AppError> {
    state
        .settings
        .apply_overrides(&req.feature_costs, &req.plan_credits)
        .await?;

    let feature_costs = state.settings.effective_feature_costs().await?;
    let plan_credits = state.settings.effective_plan_credits().await?;

    Ok(Json(EffectiveSettingsResponse {
        feature_costs,
        plan_credits,
    }))
}
