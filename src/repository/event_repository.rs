use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{parse_event_time, CreateEventRequest, Event},
    error::{AppError, Result},
    repository::EventRepository,
};

#[derive(FromRow)]
struct EventRow {
    id: String,
    title: String,
    venue: String,
    city: String,
    event_date: String,
    event_time: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: EventRow) -> Result<Event> {
        let event_date = NaiveDate::parse_from_str(&row.event_date, "%Y-%m-%d")
            .map_err(|e| AppError::Database(format!("Invalid event date {}: {}", row.event_date, e)))?;

        let event_time = match row.event_time.as_deref() {
            Some(s) => Some(parse_event_time(s).ok_or_else(|| {
                AppError::Database(format!("Invalid event time: {}", s))
            })?),
            None => None,
        };

        Ok(Event {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            venue: row.venue,
            city: row.city,
            event_date,
            event_time,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn create(&self, request: CreateEventRequest) -> Result<Event> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let event_date = request.event_date.format("%Y-%m-%d").to_string();
        let event_time = request.event_time.map(|t| t.format("%H:%M:%S").to_string());

        sqlx::query(
            r#"
            INSERT INTO events (id, title, venue, city, event_date, event_time, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.title)
        .bind(&request.venue)
        .bind(&request.city)
        .bind(&event_date)
        .bind(&event_time)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created event".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, venue, city, event_date, event_time, created_at
            FROM events
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_event).transpose()
    }

    async fn list_dated_before(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, venue, city, event_date, event_time, created_at
            FROM events
            WHERE event_date < ?
            ORDER BY event_date ASC
            "#
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn list_completed(&self, now: DateTime<Utc>, duration_hours: i64) -> Result<Vec<Event>> {
        let now_str = now.format("%Y-%m-%d %H:%M:%S").to_string();

        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, venue, city, event_date, event_time, created_at
            FROM events
            WHERE datetime(
                      event_date || ' ' || COALESCE(event_time, '23:59:59'),
                      '+' || ? || ' hours'
                  ) < ?
            ORDER BY event_date ASC
            "#
        )
        .bind(duration_hours)
        .bind(&now_str)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_event).collect()
    }
}
