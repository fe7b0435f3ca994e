use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{sse, state::AppState},
    changes::ChangeFilter,
    domain::{MembershipOrder, MembershipView, PaymentCallback, UserMembership},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub plan_id: Uuid,
    pub user_id: Uuid,
}

/// What the checkout widget hands back after a successful payment, plus
/// the purchase it was for.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    pub plan_id: Uuid,
    pub user_id: Uuid,
}

pub async fn current(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Option<MembershipView>>> {
    let view = state.service_context.membership_service
        .current_membership(user_id)
        .await?;
    Ok(Json(view))
}

pub async fn stream(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = state.service_context.membership_service.clone();
    let subscription = state.service_context.changes.subscribe(ChangeFilter::memberships_of(user_id));

    sse::snapshot_stream(subscription, move || {
        let service = service.clone();
        async move { service.current_membership(user_id).await }
    })
}

pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<UserMembership>>> {
    let memberships = state.service_context.membership_service
        .list_for_user(user_id)
        .await?;
    Ok(Json(memberships))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<MembershipOrder>> {
    let order = state.service_context.membership_service
        .create_order(request.plan_id, request.user_id)
        .await?;
    Ok(Json(order))
}

pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<(StatusCode, Json<UserMembership>)> {
    let callback = PaymentCallback {
        payment_id: request.razorpay_payment_id,
        order_id: request.razorpay_order_id,
        signature: request.razorpay_signature,
    };

    let membership = state.service_context.membership_service
        .verify_and_activate(callback, request.plan_id, request.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}
