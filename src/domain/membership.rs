use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MembershipPlan;

/// Reminders go out when exactly this many whole days remain.
pub const REMINDER_DAYS_BEFORE: i64 = 3;

/// Window in which the member-facing view flags a membership as expiring.
pub const EXPIRING_SOON_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: MembershipStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount_paid: i64,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Expired,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "Pending",
            MembershipStatus::Active => "Active",
            MembershipStatus::Expired => "Expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(MembershipStatus::Pending),
            "Active" => Some(MembershipStatus::Active),
            "Expired" => Some(MembershipStatus::Expired),
            _ => None,
        }
    }
}

/// Everything needed to write a freshly activated membership row.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount_paid: i64,
    pub payment_reference: Option<String>,
}

/// A term computed for a purchase or renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipTerm {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MembershipTerm {
    /// A renewal bought before the current term ends stacks onto it; otherwise
    /// the new term starts now.
    pub fn for_purchase(
        current_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        duration_days: i32,
    ) -> Self {
        let start = match current_end {
            Some(end) if end > now => end,
            _ => now,
        };
        Self {
            start,
            end: start + Duration::days(i64::from(duration_days)),
        }
    }
}

/// Whole days left until `end`, rounded up. Zero or negative once it has
/// passed.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (end - now).num_milliseconds();
    let whole = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Edge-triggered: true only on the exact reminder boundary, so the sweep
/// must run at least daily.
pub fn reminder_due(end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    days_remaining(end, now) == REMINDER_DAYS_BEFORE
}

/// The member-facing view of their current membership.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipView {
    pub membership: UserMembership,
    pub plan: Option<MembershipPlan>,
    pub days_remaining: i64,
    pub is_active: bool,
    pub is_expiring_soon: bool,
    pub is_expired: bool,
}

impl MembershipView {
    pub fn new(membership: UserMembership, plan: Option<MembershipPlan>, now: DateTime<Utc>) -> Self {
        let days = days_remaining(membership.end_date, now);
        let is_active = membership.status == MembershipStatus::Active && days > 0;
        Self {
            is_active,
            is_expiring_soon: days > 0 && days <= EXPIRING_SOON_DAYS,
            is_expired: days <= 0,
            days_remaining: days,
            membership,
            plan,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub reminders_sent: usize,
    pub expired: usize,
}
