//! Plan listing endpoint.

use crate::dtos::PlanResponse;
use crate::services::MeteringStore;
use crate::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Active plans, ordered for display.
pub async fn list_plans(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanResponse>>, AppError> {
    let plans = state.store.list_plans().await?;

    Ok(Json(
        plans
            .into_iter()
            .filter(|p| p.is_active)
            .map(Into::into)
            .collect(),
    ))
}
