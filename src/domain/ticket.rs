use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TicketConfig;

/// One admission unit. `created -> attended`, never back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub ticket_number: String,
    pub qr_code: String,
    pub holder_name: String,
    pub seat_index: i32,
    pub attended: bool,
    pub attended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Picks the display name for each seat.
///
/// An explicit, non-blank name for the seat wins. Otherwise, when no names
/// were given or fewer names than seats, the seat is labelled
/// `"<booker> <seat>"` (1-based). A blank entry in a complete list falls back
/// to the booker's name.
pub fn resolve_holder_names(booker: &str, seat_count: usize, names: Option<&[String]>) -> Vec<String> {
    (0..seat_count)
        .map(|i| {
            let numbered = format!("{} {}", booker, i + 1);
            match names {
                None => numbered,
                Some(names) => match names.get(i).map(|n| n.trim()).filter(|n| !n.is_empty()) {
                    Some(explicit) => explicit.to_string(),
                    None if names.len() < seat_count => numbered,
                    None => booker.to_string(),
                },
            }
        })
        .collect()
}

/// `<prefix>-<epoch millis>-<0..999>`. Not globally unique.
pub fn format_ticket_number(prefix: &str, epoch_millis: i64, suffix: u32) -> String {
    format!("{}-{}-{}", prefix, epoch_millis, suffix)
}

/// Builds the tickets for a booking. QR images are rendered by a remote
/// service; only its URL is stored.
#[derive(Debug, Clone)]
pub struct TicketIssuer {
    prefix: String,
    qr_base_url: String,
}

impl TicketIssuer {
    pub fn new(config: &TicketConfig) -> Self {
        Self {
            prefix: config.number_prefix.clone(),
            qr_base_url: config.qr_base_url.clone(),
        }
    }

    pub fn qr_code_url(&self, ticket_number: &str) -> String {
        format!("{}{}", self.qr_base_url, urlencoding::encode(ticket_number))
    }

    /// Ticket numbers for one batch, distinct within the batch.
    pub fn ticket_numbers(&self, count: usize, now: DateTime<Utc>) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut millis = now.timestamp_millis();
        let mut seen = HashSet::with_capacity(count);
        let mut numbers = Vec::with_capacity(count);
        let mut misses = 0u32;

        while numbers.len() < count {
            let candidate = format_ticket_number(&self.prefix, millis, rng.gen_range(0..1000));
            if seen.insert(candidate.clone()) {
                numbers.push(candidate);
            } else {
                misses += 1;
                // The suffix space for this millisecond is getting crowded.
                if misses % 64 == 0 {
                    millis += 1;
                }
            }
        }

        numbers
    }

    pub fn issue(&self, booking_id: Uuid, holder_names: Vec<String>, now: DateTime<Utc>) -> Vec<Ticket> {
        let numbers = self.ticket_numbers(holder_names.len(), now);
        holder_names
            .into_iter()
            .zip(numbers)
            .enumerate()
            .map(|(i, (holder_name, ticket_number))| Ticket {
                id: Uuid::new_v4(),
                booking_id,
                qr_code: self.qr_code_url(&ticket_number),
                ticket_number,
                holder_name,
                seat_index: i as i32 + 1,
                attended: false,
                attended_at: None,
                created_at: now,
            })
            .collect()
    }
}
