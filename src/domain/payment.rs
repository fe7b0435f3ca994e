use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{MembershipPlan, UserDetails};

/// What the checkout widget hands back after a successful charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

/// Order creation request sent to the gateway. `amount` is in minor units.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

/// Order as acknowledged by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Everything the client needs to open checkout for a membership plan.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipOrder {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
    pub plan: MembershipPlan,
    pub user: UserDetails,
}

pub fn membership_receipt(plan_id: Uuid, user_id: Uuid, epoch_millis: i64) -> String {
    format!("membership_{}_{}_{}", plan_id, user_id, epoch_millis)
}
