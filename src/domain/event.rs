use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event as far as ticketing is concerned. Events are authored elsewhere;
/// bookings only reference them and read their schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub city: String,
    pub event_date: NaiveDate,
    /// Scheduled start. `None` means the event runs until the end of its day.
    pub event_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Scheduled start in UTC; a missing time counts as the last millisecond
    /// of the day.
    pub fn starts_at(&self) -> DateTime<Utc> {
        let time = self.event_time.unwrap_or_else(end_of_day);
        self.event_date.and_time(time).and_utc()
    }

    /// An event is over once `duration_hours` have passed since its start.
    pub fn is_over(&self, now: DateTime<Utc>, duration_hours: i64) -> bool {
        self.starts_at() + Duration::hours(duration_hours) < now
    }

    pub fn venue_line(&self) -> String {
        format!("{}, {}", self.venue, self.city)
    }

    pub fn date_label(&self) -> String {
        self.event_date.format("%Y-%m-%d").to_string()
    }

    pub fn time_label(&self) -> String {
        self.event_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "TBA".to_string())
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default()
}

/// Parses the `HH:MM` or `HH:MM:SS` times events are stored with.
pub fn parse_event_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub venue: String,
    pub city: String,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(date: (i32, u32, u32), time: Option<(u32, u32)>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Open Mic".to_string(),
            venue: "The Loft".to_string(),
            city: "Pune".to_string(),
            event_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            event_time: time.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_over_after_four_hours() {
        let e = event((2026, 3, 1), Some((19, 0)));
        let just_before = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 1).unwrap();
        assert!(!e.is_over(just_before, 4));
        assert!(e.is_over(after, 4));
    }

    #[test]
    fn test_event_without_time_ends_at_end_of_day() {
        let e = event((2026, 3, 1), None);
        let next_morning = Utc.with_ymd_and_hms(2026, 3, 2, 3, 59, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).unwrap();
        assert!(!e.is_over(next_morning, 4));
        assert!(e.is_over(later, 4));
    }

    #[test]
    fn test_parse_event_time() {
        assert_eq!(parse_event_time("18:30"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(parse_event_time("18:30:15"), NaiveTime::from_hms_opt(18, 30, 15));
        assert_eq!(parse_event_time("6pm"), None);
    }
}
