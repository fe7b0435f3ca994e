use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "EventPass API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Memberships, event bookings and tickets",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "plans": "/api/plans",
            "bookings": "/api/bookings",
            "admin": "/admin"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let channels = state.service_context.notifier.channel_names().await;
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "notification_channels": channels,
        "payments_enabled": state.service_context.membership_service.payments_enabled(),
    })))
}
