use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{MembershipStatus, NewMembership, UserMembership},
    error::{AppError, Result},
    repository::MembershipRepository,
};

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct MembershipRow {
    id: String,
    user_id: String,
    plan_id: String,
    status: String,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
    amount_paid: i64,
    payment_reference: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_membership(row: MembershipRow) -> Result<UserMembership> {
        Ok(UserMembership {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            plan_id: Uuid::parse_str(&row.plan_id).map_err(|e| AppError::Database(e.to_string()))?,
            status: MembershipStatus::from_str(&row.status).ok_or_else(|| {
                AppError::Database(format!("Invalid membership status: {}", row.status))
            })?,
            start_date: DateTime::from_naive_utc_and_offset(row.start_date, Utc),
            end_date: DateTime::from_naive_utc_and_offset(row.end_date, Utc),
            amount_paid: row.amount_paid,
            payment_reference: row.payment_reference,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_membership).transpose()
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<UserMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE payment_reference = ?
            "#
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_membership).transpose()
    }

    async fn find_active_for_user(&self, user_id: Uuid) -> Result<Option<UserMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE user_id = ? AND status = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#
        )
        .bind(user_id.to_string())
        .bind(MembershipStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_membership).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_membership).collect()
    }

    async fn activate(&self, membership: NewMembership, supersede: Option<Uuid>) -> Result<UserMembership> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        // Expire the prior row first so the one-active-per-user index never
        // sees two active rows. Zero rows means someone else got there first.
        if let Some(prior_id) = supersede {
            let result = sqlx::query(
                r#"
                UPDATE user_memberships
                SET status = ?, updated_at = ?
                WHERE id = ? AND status = ?
                "#
            )
            .bind(MembershipStatus::Expired.as_str())
            .bind(now)
            .bind(prior_id.to_string())
            .bind(MembershipStatus::Active.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            if result.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "Membership was changed by another request; please retry".to_string(),
                ));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO user_memberships (
                id, user_id, plan_id, status, start_date, end_date,
                amount_paid, payment_reference, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(membership.user_id.to_string())
        .bind(membership.plan_id.to_string())
        .bind(MembershipStatus::Active.as_str())
        .bind(membership.start_date.naive_utc())
        .bind(membership.end_date.naive_utc())
        .bind(membership.amount_paid)
        .bind(&membership.payment_reference)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                if db.message().contains("payment_reference") {
                    AppError::Conflict("Payment has already been applied".to_string())
                } else {
                    AppError::Conflict("User already has an active membership".to_string())
                }
            }
            other => AppError::Database(other.to_string()),
        })?;

        tx.commit().await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created membership".to_string())
        })
    }

    async fn list_active_ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<UserMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE status = ? AND end_date >= ? AND end_date <= ?
            ORDER BY end_date ASC
            "#
        )
        .bind(MembershipStatus::Active.as_str())
        .bind(from.naive_utc())
        .bind(to.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_membership).collect()
    }

    async fn list_active_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<UserMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, plan_id, status, start_date, end_date,
                   amount_paid, payment_reference, created_at, updated_at
            FROM user_memberships
            WHERE status = ? AND end_date < ?
            ORDER BY end_date ASC
            "#
        )
        .bind(MembershipStatus::Active.as_str())
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_membership).collect()
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_memberships
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(MembershipStatus::Expired.as_str())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .bind(MembershipStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
