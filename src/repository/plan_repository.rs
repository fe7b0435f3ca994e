use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{default_plans, CreatePlanRequest, MembershipPlan},
    error::{AppError, Result},
    repository::PlanRepository,
};

#[derive(FromRow)]
struct PlanRow {
    id: String,
    name: String,
    description: String,
    price: i64,
    duration_days: i32,
    is_active: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePlanRepository {
    pool: SqlitePool,
}

impl SqlitePlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: PlanRow) -> Result<MembershipPlan> {
        Ok(MembershipPlan {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            description: row.description,
            price: row.price,
            duration_days: row.duration_days,
            is_active: row.is_active != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<MembershipPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, description, price, duration_days, is_active,
                   created_at, updated_at
            FROM membership_plans
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_plan).transpose()
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn create(&self, request: CreatePlanRequest) -> Result<MembershipPlan> {
        if request.price < 0 {
            return Err(AppError::BadRequest("Price cannot be negative".to_string()));
        }
        if request.duration_days <= 0 {
            return Err(AppError::BadRequest("Duration must be at least one day".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO membership_plans (
                id, name, description, price, duration_days, is_active,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(request.duration_days)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created plan".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MembershipPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, description, price, duration_days, is_active,
                   created_at, updated_at
            FROM membership_plans
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_plan).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<MembershipPlan>> {
        let query = if include_inactive {
            r#"
            SELECT id, name, description, price, duration_days, is_active,
                   created_at, updated_at
            FROM membership_plans
            ORDER BY price ASC, name ASC
            "#
        } else {
            r#"
            SELECT id, name, description, price, duration_days, is_active,
                   created_at, updated_at
            FROM membership_plans
            WHERE is_active = 1
            ORDER BY price ASC, name ASC
            "#
        };

        let rows = sqlx::query_as::<_, PlanRow>(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_plan).collect()
    }

    async fn seed_defaults(&self) -> Result<Vec<MembershipPlan>> {
        let mut created = Vec::new();

        for (name, description, price, duration_days) in default_plans() {
            // Skip if already exists
            if self.find_by_name(name).await?.is_some() {
                continue;
            }

            let plan = self
                .create(CreatePlanRequest {
                    name: name.to_string(),
                    description: description.to_string(),
                    price,
                    duration_days,
                })
                .await?;
            created.push(plan);
        }

        Ok(created)
    }
}
