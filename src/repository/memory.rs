//! In-memory repositories for service tests. One `MemoryStore` backs every
//! repository trait so cross-table behaviour (tickets by event, one active
//! membership per user) matches the SQLite schema.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};
use crate::repository::*;

#[derive(Default)]
pub struct State {
    pub users: Vec<User>,
    pub events: Vec<Event>,
    pub plans: Vec<MembershipPlan>,
    pub memberships: Vec<UserMembership>,
    pub bookings: Vec<Booking>,
    pub tickets: Vec<Ticket>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Makes `EventRepository::list_completed` fail, forcing callers onto
    /// their fallback path.
    pub fail_completed_query: AtomicBool,
    /// Makes every ticket write fail as a duplicate ticket number would.
    pub fail_ticket_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, name: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: Some(name.to_string()),
            phone: Some("9876543210".to_string()),
            city: None,
            created_at: now,
            updated_at: now,
        };
        self.state().users.push(user.clone());
        user
    }

    pub fn add_plan(&self, name: &str, price: i64, duration_days: i32) -> MembershipPlan {
        let now = Utc::now();
        let plan = MembershipPlan {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{} plan", name),
            price,
            duration_days,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state().plans.push(plan.clone());
        plan
    }

    pub fn add_event(&self, date: NaiveDate, time: Option<chrono::NaiveTime>) -> Event {
        let event = Event {
            id: Uuid::new_v4(),
            title: "Open Mic".to_string(),
            venue: "The Loft".to_string(),
            city: "Pune".to_string(),
            event_date: date,
            event_time: time,
            created_at: Utc::now(),
        };
        self.state().events.push(event.clone());
        event
    }

    /// Inserts a membership row directly, bypassing activation rules.
    pub fn add_membership(&self, membership: UserMembership) {
        self.state().memberships.push(membership);
    }

    fn check_ticket_numbers(&self, state: &State, tickets: &[Ticket]) -> Result<()> {
        if self.fail_ticket_writes.load(Ordering::SeqCst) {
            return Err(AppError::Conflict("Ticket number already issued".to_string()));
        }
        let mut seen: HashSet<&str> = state.tickets.iter().map(|t| t.ticket_number.as_str()).collect();
        for ticket in tickets {
            if !seen.insert(ticket.ticket_number.as_str()) {
                return Err(AppError::Conflict(format!(
                    "Ticket number {} already issued",
                    ticket.ticket_number
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.email == request.email) {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: request.email,
            full_name: request.full_name,
            phone: request.phone,
            city: request.city,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, request: CreateEventRequest) -> Result<Event> {
        let event = Event {
            id: Uuid::new_v4(),
            title: request.title,
            venue: request.venue,
            city: request.city,
            event_date: request.event_date,
            event_time: request.event_time,
            created_at: Utc::now(),
        };
        self.state().events.push(event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.state().events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_dated_before(&self, date: NaiveDate) -> Result<Vec<Event>> {
        Ok(self
            .state()
            .events
            .iter()
            .filter(|e| e.event_date < date)
            .cloned()
            .collect())
    }

    async fn list_completed(&self, now: DateTime<Utc>, duration_hours: i64) -> Result<Vec<Event>> {
        if self.fail_completed_query.load(Ordering::SeqCst) {
            return Err(AppError::Database("no such function: datetime".to_string()));
        }
        Ok(self
            .state()
            .events
            .iter()
            .filter(|e| e.is_over(now, duration_hours))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn create(&self, request: CreatePlanRequest) -> Result<MembershipPlan> {
        Ok(self.add_plan(&request.name, request.price, request.duration_days))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MembershipPlan>> {
        Ok(self.state().plans.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<MembershipPlan>> {
        let mut plans: Vec<_> = self
            .state()
            .plans
            .iter()
            .filter(|p| include_inactive || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn seed_defaults(&self) -> Result<Vec<MembershipPlan>> {
        let mut created = Vec::new();
        for (name, _, price, duration_days) in default_plans() {
            if self.state().plans.iter().any(|p| p.name == name) {
                continue;
            }
            created.push(self.add_plan(name, price, duration_days));
        }
        Ok(created)
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserMembership>> {
        Ok(self.state().memberships.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<UserMembership>> {
        Ok(self
            .state()
            .memberships
            .iter()
            .find(|m| m.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_active_for_user(&self, user_id: Uuid) -> Result<Option<UserMembership>> {
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserMembership>> {
        let mut rows: Vec<_> = self
            .state()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn activate(&self, membership: NewMembership, supersede: Option<Uuid>) -> Result<UserMembership> {
        let mut state = self.state();
        let now = Utc::now();

        if let Some(reference) = membership.payment_reference.as_deref() {
            if state.memberships.iter().any(|m| m.payment_reference.as_deref() == Some(reference)) {
                return Err(AppError::Conflict("Payment has already been applied".to_string()));
            }
        }

        if let Some(prior_id) = supersede {
            let prior = state
                .memberships
                .iter()
                .position(|m| m.id == prior_id && m.status == MembershipStatus::Active)
                .ok_or_else(|| {
                    AppError::Conflict("Membership was changed by another request; please retry".to_string())
                })?;
            state.memberships[prior].status = MembershipStatus::Expired;
            state.memberships[prior].updated_at = now;
        }

        let already_active = state
            .memberships
            .iter()
            .any(|m| m.user_id == membership.user_id && m.status == MembershipStatus::Active);
        if already_active {
            // Undo the supersede so the store is unchanged on failure.
            if let Some(prior_id) = supersede {
                if let Some(prior) = state.memberships.iter_mut().find(|m| m.id == prior_id) {
                    prior.status = MembershipStatus::Active;
                }
            }
            return Err(AppError::Conflict("User already has an active membership".to_string()));
        }

        let row = UserMembership {
            id: Uuid::new_v4(),
            user_id: membership.user_id,
            plan_id: membership.plan_id,
            status: MembershipStatus::Active,
            start_date: membership.start_date,
            end_date: membership.end_date,
            amount_paid: membership.amount_paid,
            payment_reference: membership.payment_reference,
            created_at: now,
            updated_at: now,
        };
        state.memberships.push(row.clone());
        Ok(row)
    }

    async fn list_active_ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<UserMembership>> {
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|m| m.status == MembershipStatus::Active && m.end_date >= from && m.end_date <= to)
            .cloned()
            .collect())
    }

    async fn list_active_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<UserMembership>> {
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|m| m.status == MembershipStatus::Active && m.end_date < now)
            .cloned()
            .collect())
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state();
        match state
            .memberships
            .iter_mut()
            .find(|m| m.id == id && m.status == MembershipStatus::Active)
        {
            Some(m) => {
                m.status = MembershipStatus::Expired;
                m.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_with_tickets(&self, booking: Booking, tickets: Vec<Ticket>) -> Result<(Booking, Vec<Ticket>)> {
        let mut state = self.state();
        self.check_ticket_numbers(&state, &tickets)?;
        state.bookings.push(booking.clone());
        state.tickets.extend(tickets.iter().cloned());
        Ok((booking, tickets))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.state().bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let mut rows: Vec<_> = self
            .state()
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(rows)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let mut rows = self.state().bookings.clone();
        rows.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Ticket>> {
        let mut rows: Vec<_> = self
            .state()
            .tickets
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.seat_index);
        Ok(rows)
    }

    async fn insert_batch(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>> {
        let mut state = self.state();
        self.check_ticket_numbers(&state, &tickets)?;
        state.tickets.extend(tickets.iter().cloned());
        Ok(tickets)
    }

    async fn mark_attended_for_event(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state();
        let booking_ids: HashSet<Uuid> = state
            .bookings
            .iter()
            .filter(|b| b.event_id == event_id)
            .map(|b| b.id)
            .collect();

        let mut changed = 0;
        for ticket in state
            .tickets
            .iter_mut()
            .filter(|t| !t.attended && booking_ids.contains(&t.booking_id))
        {
            ticket.attended = true;
            ticket.attended_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn attendance_counts(&self, event_id: Uuid) -> Result<(i64, i64)> {
        let state = self.state();
        let booking_ids: HashSet<Uuid> = state
            .bookings
            .iter()
            .filter(|b| b.event_id == event_id)
            .map(|b| b.id)
            .collect();

        let tickets: Vec<_> = state
            .tickets
            .iter()
            .filter(|t| booking_ids.contains(&t.booking_id))
            .collect();
        let attended = tickets.iter().filter(|t| t.attended).count();
        Ok((tickets.len() as i64, attended as i64))
    }
}
