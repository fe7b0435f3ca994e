use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Ticket,
    error::{AppError, Result},
    repository::TicketRepository,
};

#[derive(FromRow)]
pub(crate) struct TicketRow {
    id: String,
    booking_id: String,
    ticket_number: String,
    qr_code: String,
    holder_name: String,
    seat_index: i32,
    attended: i32,
    attended_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

pub(crate) fn row_to_ticket(row: TicketRow) -> Result<Ticket> {
    Ok(Ticket {
        id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
        booking_id: Uuid::parse_str(&row.booking_id).map_err(|e| AppError::Database(e.to_string()))?,
        ticket_number: row.ticket_number,
        qr_code: row.qr_code,
        holder_name: row.holder_name,
        seat_index: row.seat_index,
        attended: row.attended != 0,
        attended_at: row.attended_at.map(|at| DateTime::from_naive_utc_and_offset(at, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
    })
}

/// Inserts one ticket on an open connection, usually inside a transaction.
pub(crate) async fn insert_ticket(conn: &mut SqliteConnection, ticket: &Ticket) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tickets (
            id, booking_id, ticket_number, qr_code, holder_name, seat_index,
            attended, attended_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(ticket.id.to_string())
    .bind(ticket.booking_id.to_string())
    .bind(&ticket.ticket_number)
    .bind(&ticket.qr_code)
    .bind(&ticket.holder_name)
    .bind(ticket.seat_index)
    .bind(ticket.attended as i32)
    .bind(ticket.attended_at.map(|at| at.naive_utc()))
    .bind(ticket.created_at.naive_utc())
    .execute(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
            format!("Ticket number {} already issued", ticket.ticket_number),
        ),
        other => AppError::Database(other.to_string()),
    })?;

    Ok(())
}

pub struct SqliteTicketRepository {
    pool: SqlitePool,
}

impl SqliteTicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for SqliteTicketRepository {
    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, booking_id, ticket_number, qr_code, holder_name, seat_index,
                   attended, attended_at, created_at
            FROM tickets
            WHERE booking_id = ?
            ORDER BY seat_index ASC, created_at ASC
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_ticket).collect()
    }

    async fn insert_batch(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>> {
        let mut tx = self.pool.begin().await?;

        for ticket in &tickets {
            insert_ticket(&mut *tx, ticket).await?;
        }

        tx.commit().await?;
        Ok(tickets)
    }

    async fn mark_attended_for_event(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET attended = 1, attended_at = ?
            WHERE attended = 0
              AND booking_id IN (SELECT id FROM bookings WHERE event_id = ?)
            "#
        )
        .bind(at.naive_utc())
        .bind(event_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn attendance_counts(&self, event_id: Uuid) -> Result<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(t.id), COALESCE(SUM(t.attended), 0)
            FROM tickets t
            JOIN bookings b ON b.id = t.booking_id
            WHERE b.event_id = ?
            "#
        )
        .bind(event_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(counts)
    }
}
