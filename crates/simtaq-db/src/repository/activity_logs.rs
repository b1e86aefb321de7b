//! Activity log repository.

use chrono::{DateTime, Utc};
use simtaq_common::ids::generate_id;
use simtaq_common::models::activity::{ActivityLog, NewActivity};
use simtaq_common::models::user::Role;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::postgres::like_pattern;

pub async fn insert(db: impl PgExecutor<'_>, entry: &NewActivity) -> Result<ActivityLog, sqlx::Error> {
    sqlx::query_as::<_, ActivityLog>(
        r#"
        INSERT INTO activity_logs (id, actor_id, actor_role, actor_name, action, category, title,
                                   description, target_user_id, target_role, target_name, metadata,
                                   ip_address, user_agent, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW())
        RETURNING *
        "#,
    )
    .bind(generate_id())
    .bind(entry.actor_id)
    .bind(entry.actor_role)
    .bind(entry.actor_name.as_deref())
    .bind(entry.action.as_str())
    .bind(entry.action.category().as_str())
    .bind(&entry.title)
    .bind(entry.description.as_deref())
    .bind(entry.target_user_id)
    .bind(entry.target_role)
    .bind(entry.target_name.as_deref())
    .bind(entry.metadata.as_ref())
    .bind(entry.ip_address.as_deref())
    .bind(entry.user_agent.as_deref())
    .fetch_one(db)
    .await
}

const FILTER_WHERE: &str = r#"
    WHERE ($1::text IS NULL OR actor_role = $1)
      AND ($2::text IS NULL OR action = $2)
      AND ($3::uuid IS NULL OR actor_id = $3)
      AND ($4::timestamptz IS NULL OR created_at >= $4)
      AND ($5::timestamptz IS NULL OR created_at < $5)
      AND ($6::text IS NULL OR title ILIKE $6 OR actor_name ILIKE $6 OR target_name ILIKE $6)
"#;

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub role: Option<Role>,
    pub action: Option<String>,
    pub actor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl ActivityFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern)
    }
}

pub async fn list(
    pool: &PgPool,
    filter: &ActivityFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<ActivityLog>, sqlx::Error> {
    sqlx::query_as::<_, ActivityLog>(&format!(
        "SELECT * FROM activity_logs {FILTER_WHERE} ORDER BY created_at DESC LIMIT $7 OFFSET $8"
    ))
    .bind(filter.role)
    .bind(filter.action.as_deref())
    .bind(filter.actor_id)
    .bind(filter.from)
    .bind(filter.to)
    .bind(filter.search_pattern())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool, filter: &ActivityFilter) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM activity_logs {FILTER_WHERE}"))
        .bind(filter.role)
        .bind(filter.action.as_deref())
        .bind(filter.actor_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.search_pattern())
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Latest entries of one actor.
pub async fn recent_for_actor(pool: &PgPool, actor_id: Uuid, limit: i64) -> Result<Vec<ActivityLog>, sqlx::Error> {
    sqlx::query_as::<_, ActivityLog>(
        "SELECT * FROM activity_logs WHERE actor_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(actor_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
