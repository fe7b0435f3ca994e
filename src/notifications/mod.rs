use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::config::NotificationConfig;
use crate::domain::{Booking, Event, Ticket};
use crate::error::Result;

pub mod email;
pub mod logging;
pub mod render;
pub mod whatsapp;

pub use email::EmailChannel;
pub use logging::LogChannel;
pub use whatsapp::WhatsAppChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipEmailKind {
    Purchase,
    Reminder,
    Expired,
}

impl MembershipEmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipEmailKind::Purchase => "purchase",
            MembershipEmailKind::Reminder => "reminder",
            MembershipEmailKind::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipEmail {
    pub kind: MembershipEmailKind,
    pub to: String,
    pub user_name: String,
    pub plan_name: String,
    pub end_date: DateTime<Utc>,
    pub days_remaining: Option<i64>,
}

/// Ticket delivery email. `ticket_numbers`, `qr_codes` and `holder_names`
/// are parallel arrays: entry `i` of each describes the same ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketEmail {
    pub to: String,
    pub name: String,
    pub event_title: String,
    pub event_date: String,
    pub event_time: String,
    pub event_venue: String,
    pub ticket_numbers: Vec<String>,
    pub qr_codes: Vec<String>,
    pub holder_names: Vec<String>,
}

impl TicketEmail {
    pub fn new(booking: &Booking, event: &Event, tickets: &[Ticket]) -> Self {
        Self {
            to: booking.email.clone(),
            name: booking.name.clone(),
            event_title: event.title.clone(),
            event_date: event.date_label(),
            event_time: event.time_label(),
            event_venue: event.venue_line(),
            ticket_numbers: tickets.iter().map(|t| t.ticket_number.clone()).collect(),
            qr_codes: tickets.iter().map(|t| t.qr_code.clone()).collect(),
            holder_names: tickets.iter().map(|t| t.holder_name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingConfirmation {
    pub to: String,
    pub name: String,
    pub event_title: String,
    pub event_date: String,
    pub event_time: String,
    pub event_venue: String,
    pub ticket_count: i32,
}

impl BookingConfirmation {
    pub fn new(booking: &Booking, event: &Event) -> Self {
        Self {
            to: booking.email.clone(),
            name: booking.name.clone(),
            event_title: event.title.clone(),
            event_date: event.date_label(),
            event_time: event.time_label(),
            event_venue: event.venue_line(),
            ticket_count: booking.ticket_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatsAppSummary {
    pub to: String,
    pub event_title: String,
    pub ticket_count: i32,
    pub date: String,
    pub time: String,
    pub venue: String,
}

impl WhatsAppSummary {
    pub fn new(booking: &Booking, event: &Event) -> Self {
        Self {
            to: booking.phone.clone(),
            event_title: event.title.clone(),
            ticket_count: booking.ticket_count,
            date: event.date_label(),
            time: event.time_label(),
            venue: event.venue_line(),
        }
    }

    pub fn message(&self) -> String {
        let noun = if self.ticket_count == 1 { "ticket" } else { "tickets" };
        format!(
            "Your booking for {} is confirmed! {} {} on {} at {}, {}. Your tickets have been emailed to you.",
            self.event_title, self.ticket_count, noun, self.date, self.time, self.venue
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Membership(MembershipEmail),
    Tickets(TicketEmail),
    BookingConfirmation(BookingConfirmation),
    WhatsApp(WhatsAppSummary),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Membership(m) => match m.kind {
                MembershipEmailKind::Purchase => "membership_purchase",
                MembershipEmailKind::Reminder => "membership_reminder",
                MembershipEmailKind::Expired => "membership_expired",
            },
            Notification::Tickets(_) => "tickets",
            Notification::BookingConfirmation(_) => "booking_confirmation",
            Notification::WhatsApp(_) => "whatsapp_summary",
        }
    }

    /// Email address or phone number, depending on the variant.
    pub fn recipient(&self) -> &str {
        match self {
            Notification::Membership(m) => &m.to,
            Notification::Tickets(t) => &t.to,
            Notification::BookingConfirmation(b) => &b.to,
            Notification::WhatsApp(w) => &w.to,
        }
    }

    pub fn is_email(&self) -> bool {
        !matches!(self, Notification::WhatsApp(_))
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    fn accepts(&self, notification: &Notification) -> bool;
    async fn deliver(&self, notification: &Notification) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        }
    }

    /// Delay before retry number `attempt + 1`: base * 2^attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

struct Worker {
    name: String,
    channel: Arc<dyn NotificationChannel>,
    sender: mpsc::Sender<Notification>,
    handle: JoinHandle<()>,
}

/// Fans notifications out to every registered channel. Each channel has its
/// own bounded queue and worker task, so a slow or failing provider never
/// holds up the others or the request that triggered the notification.
pub struct Notifier {
    policy: RetryPolicy,
    queue_capacity: usize,
    workers: RwLock<Vec<Worker>>,
}

impl Notifier {
    pub fn new(policy: RetryPolicy, queue_capacity: usize) -> Self {
        Self {
            policy,
            queue_capacity: queue_capacity.max(1),
            workers: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(RetryPolicy::from_config(config), config.queue_capacity)
    }

    pub async fn register(&self, channel: Arc<dyn NotificationChannel>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let handle = tokio::spawn(run_worker(channel.clone(), receiver, self.policy));
        let name = channel.name().to_string();

        tracing::info!("Registered notification channel: {}", name);
        self.workers.write().await.push(Worker {
            name,
            channel,
            sender,
            handle,
        });
    }

    pub async fn channel_names(&self) -> Vec<String> {
        self.workers.read().await.iter().map(|w| w.name.clone()).collect()
    }

    /// Queues `notification` on every channel that accepts it. Never waits on
    /// delivery; a full queue drops the job with a warning.
    pub async fn dispatch(&self, notification: Notification) {
        let workers = self.workers.read().await;
        let mut queued = 0;

        for worker in workers.iter().filter(|w| w.channel.accepts(&notification)) {
            match worker.sender.try_send(notification.clone()) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Notification queue for {} is full, dropping {} for {}",
                        worker.name,
                        notification.kind(),
                        notification.recipient()
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!("Notification channel {} has shut down", worker.name);
                }
            }
        }

        if queued == 0 {
            tracing::debug!("No channel accepted {} notification", notification.kind());
        }
    }

    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let workers = self.workers.read().await;
        let mut results = Vec::new();

        for worker in workers.iter() {
            results.push((worker.name.clone(), worker.channel.health_check().await));
        }

        results
    }

    /// Stops accepting work and waits until every queued job has been
    /// delivered or given up on.
    pub async fn close(&self) {
        let workers = std::mem::take(&mut *self.workers.write().await);

        for Worker { name, sender, handle, .. } in workers {
            drop(sender);
            if let Err(e) = handle.await {
                tracing::error!("Notification worker {} panicked: {}", name, e);
            }
        }
    }
}

async fn run_worker(
    channel: Arc<dyn NotificationChannel>,
    mut receiver: mpsc::Receiver<Notification>,
    policy: RetryPolicy,
) {
    while let Some(notification) = receiver.recv().await {
        deliver_with_retry(channel.as_ref(), &notification, policy).await;
    }
    tracing::debug!("Notification worker {} stopped", channel.name());
}

/// Returns whether the notification was eventually delivered.
pub async fn deliver_with_retry(
    channel: &dyn NotificationChannel,
    notification: &Notification,
    policy: RetryPolicy,
) -> bool {
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        match channel.deliver(notification).await {
            Ok(()) => {
                tracing::debug!(
                    "{} delivered {} to {}",
                    channel.name(),
                    notification.kind(),
                    notification.recipient()
                );
                return true;
            }
            Err(e) if attempt + 1 < attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "{} failed to deliver {} (attempt {}/{}): {}; retrying in {:?}",
                    channel.name(),
                    notification.kind(),
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    "{} gave up delivering {} to {} after {} attempts: {}",
                    channel.name(),
                    notification.kind(),
                    notification.recipient(),
                    attempts,
                    e
                );
            }
        }
    }

    false
}
