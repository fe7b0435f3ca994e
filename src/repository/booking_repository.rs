use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, Ticket},
    error::{AppError, Result},
    repository::{ticket_repository::insert_ticket, BookingRepository},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    user_id: String,
    event_id: String,
    name: String,
    email: String,
    phone: String,
    ticket_count: i32,
    amount: i64,
    status: String,
    ticket_names: Option<String>,
    booked_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        let ticket_names = match row.ticket_names.as_deref() {
            Some(json) => Some(
                serde_json::from_str::<Vec<String>>(json)
                    .map_err(|e| AppError::Database(format!("Invalid ticket names: {}", e)))?,
            ),
            None => None,
        };

        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            event_id: Uuid::parse_str(&row.event_id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            ticket_count: row.ticket_count,
            amount: row.amount,
            status: BookingStatus::from_str(&row.status).ok_or_else(|| {
                AppError::Database(format!("Invalid booking status: {}", row.status))
            })?,
            ticket_names,
            booked_at: DateTime::from_naive_utc_and_offset(row.booked_at, Utc),
        })
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create_with_tickets(&self, booking: Booking, tickets: Vec<Ticket>) -> Result<(Booking, Vec<Ticket>)> {
        let ticket_names = booking
            .ticket_names
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, user_id, event_id, name, email, phone, ticket_count,
                amount, status, ticket_names, booked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(booking.id.to_string())
        .bind(booking.user_id.to_string())
        .bind(booking.event_id.to_string())
        .bind(&booking.name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(booking.ticket_count)
        .bind(booking.amount)
        .bind(booking.status.as_str())
        .bind(&ticket_names)
        .bind(booking.booked_at.naive_utc())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        // Any failure here drops `tx`, which rolls the booking back too.
        for ticket in &tickets {
            insert_ticket(&mut *tx, ticket).await?;
        }

        tx.commit().await?;

        let stored = self.find_by_id(booking.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })?;

        Ok((stored, tickets))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, event_id, name, email, phone, ticket_count,
                   amount, status, ticket_names, booked_at
            FROM bookings
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, event_id, name, email, phone, ticket_count,
                   amount, status, ticket_names, booked_at
            FROM bookings
            WHERE user_id = ?
            ORDER BY booked_at DESC
            "#
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, event_id, name, email, phone, ticket_count,
                   amount, status, ticket_names, booked_at
            FROM bookings
            ORDER BY booked_at DESC
            LIMIT ? OFFSET ?
            "#
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
