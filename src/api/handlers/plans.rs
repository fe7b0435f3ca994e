use axum::{extract::State, Json};

use crate::{
    api::state::AppState,
    domain::MembershipPlan,
    error::Result,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<MembershipPlan>>> {
    let plans = state.service_context.membership_service.list_plans().await?;
    Ok(Json(plans))
}
