use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::{sse, state::AppState},
    changes::ChangeFilter,
    domain::{BookingWithTickets, CreateBookingRequest, Ticket},
    error::Result,
};

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingWithTickets>)> {
    let booking = state.service_context.booking_service
        .create_booking(request)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<BookingWithTickets>>> {
    let bookings = state.service_context.booking_service
        .list_user_bookings(user_id)
        .await?;
    Ok(Json(bookings))
}

/// Opening the tickets of a finished event checks everyone in.
pub async fn tickets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingWithTickets>> {
    let booking = state.service_context.booking_service
        .open_booking_tickets(id)
        .await?;
    Ok(Json(booking))
}

pub async fn tickets_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let service = state.service_context.booking_service.clone();
    let opened = service.open_booking_tickets(id).await?;

    let filter = ChangeFilter::tickets_of(id).with_event(opened.booking.event_id);
    let subscription = state.service_context.changes.subscribe(filter);

    Ok(sse::snapshot_stream(subscription, move || {
        let service = service.clone();
        async move { service.open_booking_tickets(id).await }
    }))
}

pub async fn generate_tickets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ticket>>> {
    let tickets = state.service_context.booking_service
        .generate_missing_tickets(id)
        .await?;
    Ok(Json(tickets))
}

pub async fn resend_email(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    state.service_context.booking_service
        .resend_ticket_email(id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}
