use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{
    api::state::AppState,
    error::AppError,
};

/// Admin routes take a static bearer token from `admin.api_token`. With no
/// token configured they are switched off entirely.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.settings.admin.api_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::ServiceUnavailable("Admin API is not configured".to_string()))?;

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !bool::from(provided.trim().as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("Rejected admin request with a bad token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
