use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    error::Result,
    service::AttendanceStats,
};

pub async fn stats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AttendanceStats>> {
    let stats = state.service_context.attendance_service
        .attendance_stats(event_id)
        .await?;
    Ok(Json(stats))
}
