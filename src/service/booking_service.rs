use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    changes::{ChangeEvent, ChangeFeed, ChangeKind},
    domain::*,
    error::{AppError, Result},
    notifications::{BookingConfirmation, Notification, Notifier, TicketEmail, WhatsAppSummary},
    repository::{BookingRepository, EventRepository, TicketRepository},
    service::attendance_service::AttendanceService,
};

pub struct BookingService {
    booking_repo: Arc<dyn BookingRepository>,
    ticket_repo: Arc<dyn TicketRepository>,
    event_repo: Arc<dyn EventRepository>,
    attendance: Arc<AttendanceService>,
    issuer: TicketIssuer,
    notifier: Arc<Notifier>,
    changes: ChangeFeed,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        ticket_repo: Arc<dyn TicketRepository>,
        event_repo: Arc<dyn EventRepository>,
        attendance: Arc<AttendanceService>,
        issuer: TicketIssuer,
        notifier: Arc<Notifier>,
        changes: ChangeFeed,
    ) -> Self {
        Self {
            booking_repo,
            ticket_repo,
            event_repo,
            attendance,
            issuer,
            notifier,
            changes,
        }
    }

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<BookingWithTickets> {
        self.create_booking_at(request, Utc::now()).await
    }

    /// Writes the booking together with one ticket per seat. Either all of
    /// it is stored or none of it is; notifications go out only afterwards.
    pub async fn create_booking_at(&self, request: CreateBookingRequest, now: DateTime<Utc>) -> Result<BookingWithTickets> {
        request.validate()?;
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }

        let event = self
            .event_repo
            .find_by_id(request.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let holder_names = resolve_holder_names(
            request.name.trim(),
            request.seat_count as usize,
            request.ticket_names.as_deref(),
        );
        let booking = request.into_booking(now);
        let tickets = self.issuer.issue(booking.id, holder_names, now);

        let (booking, tickets) = self.booking_repo.create_with_tickets(booking, tickets).await?;

        tracing::info!(
            "Booking {} confirmed for event {} with {} tickets",
            booking.id,
            event.id,
            tickets.len()
        );

        self.changes.publish(ChangeEvent::booking(
            ChangeKind::Inserted,
            booking.id,
            booking.user_id,
            booking.event_id,
        ));
        self.changes.publish(ChangeEvent::tickets(ChangeKind::Inserted, booking.id, Some(booking.event_id)));

        self.notifier.dispatch(Notification::Tickets(TicketEmail::new(&booking, &event, &tickets))).await;
        self.notifier.dispatch(Notification::WhatsApp(WhatsAppSummary::new(&booking, &event))).await;
        self.notifier
            .dispatch(Notification::BookingConfirmation(BookingConfirmation::new(&booking, &event)))
            .await;

        Ok(BookingWithTickets {
            booking,
            event: Some(event),
            tickets,
        })
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    async fn find_event_for(&self, booking: &Booking) -> Result<Option<Event>> {
        self.event_repo.find_by_id(booking.event_id).await
    }

    async fn with_details(&self, booking: Booking) -> Result<BookingWithTickets> {
        let tickets = self.ticket_repo.list_for_booking(booking.id).await?;
        let event = match self.find_event_for(&booking).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Could not load event {} for booking {}: {}", booking.event_id, booking.id, e);
                None
            }
        };

        Ok(BookingWithTickets { booking, event, tickets })
    }

    /// The user's bookings, newest first, each with its event and tickets.
    pub async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<BookingWithTickets>> {
        let bookings = self.booking_repo.list_for_user(user_id).await?;
        let mut detailed = Vec::with_capacity(bookings.len());
        for booking in bookings {
            detailed.push(self.with_details(booking).await?);
        }
        Ok(detailed)
    }

    pub async fn list_all_bookings(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        self.booking_repo.list_all(limit.clamp(1, 500), offset.max(0)).await
    }

    pub async fn booking_tickets(&self, booking_id: Uuid) -> Result<Vec<Ticket>> {
        self.find_booking(booking_id).await?;
        self.ticket_repo.list_for_booking(booking_id).await
    }

    pub async fn open_booking_tickets(&self, booking_id: Uuid) -> Result<BookingWithTickets> {
        self.open_booking_tickets_at(booking_id, Utc::now()).await
    }

    /// Tickets as shown to their holder. Opening the tickets of an event that
    /// is already over marks its attendance first.
    pub async fn open_booking_tickets_at(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<BookingWithTickets> {
        let booking = self.find_booking(booking_id).await?;

        if let Some(event) = self.find_event_for(&booking).await? {
            if event.is_over(now, self.attendance.event_duration_hours()) {
                if let Err(e) = self.attendance.mark_attended_for_event_at(event.id, now).await {
                    tracing::warn!("Failed to mark attendance for event {}: {}", event.id, e);
                }
            }
        }

        self.with_details(booking).await
    }

    pub async fn generate_missing_tickets(&self, booking_id: Uuid) -> Result<Vec<Ticket>> {
        self.generate_missing_tickets_at(booking_id, Utc::now()).await
    }

    /// Issues the booking's tickets if it has none. A booking that already
    /// has tickets is left alone.
    pub async fn generate_missing_tickets_at(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Ticket>> {
        let booking = self.find_booking(booking_id).await?;

        let existing = self.ticket_repo.list_for_booking(booking.id).await?;
        if !existing.is_empty() {
            tracing::debug!("Tickets already exist for booking {}", booking.id);
            return Ok(existing);
        }

        let holder_names = resolve_holder_names(
            &booking.name,
            booking.ticket_count.max(0) as usize,
            booking.ticket_names.as_deref(),
        );
        let tickets = self
            .ticket_repo
            .insert_batch(self.issuer.issue(booking.id, holder_names, now))
            .await?;

        tracing::info!("Generated {} missing tickets for booking {}", tickets.len(), booking.id);
        self.changes.publish(ChangeEvent::tickets(ChangeKind::Inserted, booking.id, Some(booking.event_id)));

        Ok(tickets)
    }

    /// Sends the ticket email again from what is stored. Writes nothing.
    pub async fn resend_ticket_email(&self, booking_id: Uuid) -> Result<()> {
        let booking = self.find_booking(booking_id).await?;
        let event = self
            .find_event_for(&booking)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found for booking".to_string()))?;

        let tickets = self.ticket_repo.list_for_booking(booking.id).await?;
        if tickets.is_empty() {
            return Err(AppError::NotFound("No tickets found for booking".to_string()));
        }

        self.notifier.dispatch(Notification::Tickets(TicketEmail::new(&booking, &event, &tickets))).await;
        tracing::info!("Queued ticket email resend for booking {}", booking.id);

        Ok(())
    }
}
