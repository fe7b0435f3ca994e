pub mod handlers;
pub mod middleware;
pub mod sse;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api", api_routes())
        .nest("/admin", admin_routes(app_state.clone()))

        .with_state(app_state)

        // Event streams are skipped by the default compression predicate
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(handlers::plans::list))
        .nest("/users/:user_id", user_routes())
        .nest("/memberships", membership_routes())
        .nest("/bookings", booking_routes())
        .route("/events/:id/attendance", get(handlers::attendance::stats))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/membership", get(handlers::memberships::current))
        .route("/membership/stream", get(handlers::memberships::stream))
        .route("/memberships", get(handlers::memberships::history))
        .route("/bookings", get(handlers::bookings::list_for_user))
}

fn membership_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::memberships::create_order))
        .route("/verify", post(handlers::memberships::verify))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::bookings::create))
        .route("/:id/tickets", get(handlers::bookings::tickets))
        .route("/:id/tickets/stream", get(handlers::bookings::tickets_stream))
        .route("/:id/tickets/generate", post(handlers::bookings::generate_tickets))
        .route("/:id/resend-email", post(handlers::bookings::resend_email))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", get(handlers::admin::list_bookings))
        .route("/events/:id/mark-attended", post(handlers::admin::mark_attended))
        .route("/sweeps/memberships", post(handlers::admin::sweep_memberships))
        .route("/sweeps/attendance", post(handlers::admin::sweep_attendance))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admin::require_admin_token,
        ))
}
