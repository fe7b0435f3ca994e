use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod event_repository;
pub mod plan_repository;
pub mod membership_repository;
pub mod booking_repository;
pub mod ticket_repository;

#[cfg(test)]
pub mod memory;

pub use user_repository::SqliteUserRepository;
pub use event_repository::SqliteEventRepository;
pub use plan_repository::SqlitePlanRepository;
pub use membership_repository::SqliteMembershipRepository;
pub use booking_repository::SqliteBookingRepository;
pub use ticket_repository::SqliteTicketRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: CreateEventRequest) -> Result<Event>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>>;
    /// Events whose date is strictly before `date`.
    async fn list_dated_before(&self, date: NaiveDate) -> Result<Vec<Event>>;
    /// Events the store itself considers over: start + `duration_hours` < `now`.
    async fn list_completed(&self, now: DateTime<Utc>, duration_hours: i64) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn create(&self, plan: CreatePlanRequest) -> Result<MembershipPlan>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MembershipPlan>>;
    /// Ordered by price, cheapest first.
    async fn list(&self, include_inactive: bool) -> Result<Vec<MembershipPlan>>;
    async fn seed_defaults(&self) -> Result<Vec<MembershipPlan>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserMembership>>;
    /// The membership a gateway payment was applied to, if any.
    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<UserMembership>>;
    /// Newest active membership for the user, if any.
    async fn find_active_for_user(&self, user_id: Uuid) -> Result<Option<UserMembership>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserMembership>>;
    /// Atomically expires `supersede` (which must still be active) and
    /// inserts `membership` as the user's active row. Fails with `Conflict`
    /// and writes nothing if another activation won the race.
    async fn activate(&self, membership: NewMembership, supersede: Option<Uuid>) -> Result<UserMembership>;
    async fn list_active_ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<UserMembership>>;
    async fn list_active_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<UserMembership>>;
    /// Returns false when the row was not active (already expired).
    async fn mark_expired(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Writes the booking and all of its tickets, or nothing.
    async fn create_with_tickets(&self, booking: Booking, tickets: Vec<Ticket>) -> Result<(Booking, Vec<Ticket>)>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Tickets in issue order.
    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Ticket>>;
    /// Inserts all tickets or none.
    async fn insert_batch(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>>;
    /// Flips every not-yet-attended ticket of the event. Returns rows changed.
    async fn mark_attended_for_event(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<u64>;
    /// (total, attended) for the event.
    async fn attendance_counts(&self, event_id: Uuid) -> Result<(i64, i64)>;
}
