//! In-process change feed. Writers publish a [`ChangeEvent`] after every
//! committed mutation; readers subscribe with a [`ChangeFilter`] and re-run
//! their query whenever something matching arrives. Events carry identities
//! only, never row contents.

use futures_util::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEntity {
    Membership,
    Booking,
    Ticket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub entity: ChangeEntity,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub user_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn membership(kind: ChangeKind, row_id: Uuid, user_id: Uuid) -> Self {
        Self {
            entity: ChangeEntity::Membership,
            kind,
            row_id,
            user_id: Some(user_id),
            booking_id: None,
            event_id: None,
        }
    }

    pub fn booking(kind: ChangeKind, booking_id: Uuid, user_id: Uuid, event_id: Uuid) -> Self {
        Self {
            entity: ChangeEntity::Booking,
            kind,
            row_id: booking_id,
            user_id: Some(user_id),
            booking_id: Some(booking_id),
            event_id: Some(event_id),
        }
    }

    /// One event per batch of ticket rows under a booking.
    pub fn tickets(kind: ChangeKind, booking_id: Uuid, event_id: Option<Uuid>) -> Self {
        Self {
            entity: ChangeEntity::Ticket,
            kind,
            row_id: booking_id,
            user_id: None,
            booking_id: Some(booking_id),
            event_id,
        }
    }

    /// Attendance marking touches tickets of many bookings at once.
    pub fn event_tickets(event_id: Uuid) -> Self {
        Self {
            entity: ChangeEntity::Ticket,
            kind: ChangeKind::Updated,
            row_id: event_id,
            user_id: None,
            booking_id: None,
            event_id: Some(event_id),
        }
    }
}

/// Which changes a subscriber cares about. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub entity: Option<ChangeEntity>,
    pub user_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
}

impl ChangeFilter {
    pub fn memberships_of(user_id: Uuid) -> Self {
        Self {
            entity: Some(ChangeEntity::Membership),
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn tickets_of(booking_id: Uuid) -> Self {
        Self {
            entity: Some(ChangeEntity::Ticket),
            booking_id: Some(booking_id),
            ..Self::default()
        }
    }

    /// Adds event-level ticket changes (attendance sweeps) to a booking filter.
    pub fn with_event(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(entity) = self.entity {
            if event.entity != entity {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if event.user_id != Some(user_id) {
                return false;
            }
        }

        // A booking filter also accepts changes addressed to the booking's
        // event, since those cover its tickets too.
        match (self.booking_id, self.event_id) {
            (Some(booking_id), Some(event_id)) => {
                event.booking_id == Some(booking_id)
                    || (event.booking_id.is_none() && event.event_id == Some(event_id))
            }
            (Some(booking_id), None) => event.booking_id == Some(booking_id),
            (None, Some(event_id)) => event.event_id == Some(event_id),
            (None, None) => true,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!("Change published: {:?} {:?} {}", event.entity, event.kind, event.row_id);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Waits for the next matching change. `None` once the feed is gone.
    ///
    /// A lagged receiver has missed events it cannot recover, so lagging is
    /// reported as a change: the caller re-fetches and is current again.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Change subscriber lagged by {} events", skipped);
                    return Some(self.resync_marker());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn resync_marker(&self) -> ChangeEvent {
        ChangeEvent {
            entity: self.filter.entity.unwrap_or(ChangeEntity::Ticket),
            kind: ChangeKind::Updated,
            row_id: Uuid::nil(),
            user_id: self.filter.user_id,
            booking_id: self.filter.booking_id,
            event_id: self.filter.event_id,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}
