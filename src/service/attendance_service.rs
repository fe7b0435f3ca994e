use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    changes::{ChangeEvent, ChangeFeed},
    domain::Event,
    error::{AppError, Result},
    repository::{EventRepository, TicketRepository},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendanceStats {
    pub total_tickets: i64,
    pub attended_tickets: i64,
    /// Percentage, 0 when the event has no tickets.
    pub attendance_rate: f64,
}

impl AttendanceStats {
    pub fn new(total_tickets: i64, attended_tickets: i64) -> Self {
        let attendance_rate = if total_tickets > 0 {
            attended_tickets as f64 / total_tickets as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_tickets,
            attended_tickets,
            attendance_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventAttendanceResult {
    pub event_id: Uuid,
    pub success: bool,
    pub tickets_updated: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletedEventsReport {
    pub success: bool,
    pub total_tickets_updated: u64,
    pub results: Vec<EventAttendanceResult>,
}

pub struct AttendanceService {
    event_repo: Arc<dyn EventRepository>,
    ticket_repo: Arc<dyn TicketRepository>,
    changes: ChangeFeed,
    event_duration_hours: i64,
}

impl AttendanceService {
    pub fn new(
        event_repo: Arc<dyn EventRepository>,
        ticket_repo: Arc<dyn TicketRepository>,
        changes: ChangeFeed,
        event_duration_hours: i64,
    ) -> Self {
        Self {
            event_repo,
            ticket_repo,
            changes,
            event_duration_hours,
        }
    }

    pub fn event_duration_hours(&self) -> i64 {
        self.event_duration_hours
    }

    pub async fn mark_attended_for_event(&self, event_id: Uuid) -> Result<u64> {
        self.mark_attended_for_event_at(event_id, Utc::now()).await
    }

    /// Marks every not-yet-attended ticket of the event. Calling it again
    /// changes nothing and returns 0.
    pub async fn mark_attended_for_event_at(&self, event_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        self.event_repo
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let updated = self.ticket_repo.mark_attended_for_event(event_id, now).await?;

        if updated > 0 {
            tracing::info!("Marked {} tickets attended for event {}", updated, event_id);
            self.changes.publish(ChangeEvent::event_tickets(event_id));
        } else {
            tracing::debug!("No unattended tickets left for event {}", event_id);
        }

        Ok(updated)
    }

    pub async fn attendance_stats(&self, event_id: Uuid) -> Result<AttendanceStats> {
        self.event_repo
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let (total, attended) = self.ticket_repo.attendance_counts(event_id).await?;
        Ok(AttendanceStats::new(total, attended))
    }

    pub async fn process_completed_events(&self) -> CompletedEventsReport {
        self.process_completed_events_at(Utc::now()).await
    }

    /// Marks attendance for every event that is over. Asks the store for
    /// completed events first; if that query fails, recomputes completion
    /// locally over the events dated before today.
    pub async fn process_completed_events_at(&self, now: DateTime<Utc>) -> CompletedEventsReport {
        let events = match self.event_repo.list_completed(now, self.event_duration_hours).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Completed-events query failed, falling back to local check: {}", e);
                match self.completed_events_fallback(now).await {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::error!("Failed to list past events: {}", e);
                        return CompletedEventsReport {
                            success: false,
                            total_tickets_updated: 0,
                            results: Vec::new(),
                        };
                    }
                }
            }
        };

        let mut total_tickets_updated = 0;
        let mut results = Vec::with_capacity(events.len());

        for event in events {
            match self.ticket_repo.mark_attended_for_event(event.id, now).await {
                Ok(updated) => {
                    if updated > 0 {
                        self.changes.publish(ChangeEvent::event_tickets(event.id));
                    }
                    total_tickets_updated += updated;
                    results.push(EventAttendanceResult {
                        event_id: event.id,
                        success: true,
                        tickets_updated: updated,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to mark attendance for event {}: {}", event.id, e);
                    results.push(EventAttendanceResult {
                        event_id: event.id,
                        success: false,
                        tickets_updated: 0,
                        error: Some("Failed to mark tickets as attended".to_string()),
                    });
                }
            }
        }

        tracing::info!(
            "Processed {} completed events, {} tickets marked attended",
            results.len(),
            total_tickets_updated
        );

        CompletedEventsReport {
            success: true,
            total_tickets_updated,
            results,
        }
    }

    async fn completed_events_fallback(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let past = self.event_repo.list_dated_before(now.date_naive()).await?;
        Ok(past
            .into_iter()
            .filter(|e| e.is_over(now, self.event_duration_hours))
            .collect())
    }
}
