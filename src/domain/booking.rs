use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Event, Ticket};

/// Upper bound on seats per booking. Issuance runs one insert per seat.
pub const MAX_SEATS_PER_BOOKING: i32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub ticket_count: i32,
    pub amount: i64,
    pub status: BookingStatus,
    pub ticket_names: Option<Vec<String>>,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Confirmed" => Some(BookingStatus::Confirmed),
            "Cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 5, max = 20, message = "invalid phone number"))]
    pub phone: String,
    #[validate(range(min = 1, max = 50, message = "seat count must be between 1 and 50"))]
    pub seat_count: i32,
    #[validate(range(min = 0, message = "amount cannot be negative"))]
    pub amount: i64,
    #[serde(default)]
    pub ticket_names: Option<Vec<String>>,
}

impl CreateBookingRequest {
    pub fn into_booking(self, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            event_id: self.event_id,
            name: self.name.trim().to_string(),
            email: self.email,
            phone: self.phone,
            ticket_count: self.seat_count,
            amount: self.amount,
            status: BookingStatus::Confirmed,
            ticket_names: self.ticket_names,
            booked_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingWithTickets {
    pub booking: Booking,
    pub event: Option<Event>,
    pub tickets: Vec<Ticket>,
}
