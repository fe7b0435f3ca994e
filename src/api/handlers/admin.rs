use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Booking, SweepReport},
    error::Result,
    service::CompletedEventsReport,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<Booking>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkAttendedResponse {
    event_id: Uuid,
    tickets_updated: u64,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = state.service_context.booking_service
        .list_all_bookings(params.limit, params.offset)
        .await?;

    let total = bookings.len();
    Ok(Json(ListResponse { bookings, total }))
}

pub async fn mark_attended(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<MarkAttendedResponse>> {
    let tickets_updated = state.service_context.attendance_service
        .mark_attended_for_event(event_id)
        .await?;
    Ok(Json(MarkAttendedResponse { event_id, tickets_updated }))
}

pub async fn sweep_memberships(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let report = state.service_context.membership_service
        .sweep_expirations()
        .await?;
    Ok(Json(report))
}

pub async fn sweep_attendance(State(state): State<AppState>) -> Json<CompletedEventsReport> {
    Json(state.service_context.attendance_service.process_completed_events().await)
}
