use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable membership tier. Prices are whole currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipPlan {
    /// Amount in minor units (paise, cents) as the gateway expects it.
    pub fn price_minor_units(&self) -> i64 {
        self.price * 100
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration_days: i32,
}

/// Default plans to seed (name, description, price, duration_days)
pub fn default_plans() -> Vec<(&'static str, &'static str, i64, i32)> {
    vec![
        ("Monthly", "Priority access and member-only events for a month", 299, 30),
        ("Quarterly", "Three months of membership at a discount", 799, 90),
        ("Annual", "A full year of membership", 2499, 365),
    ]
}
