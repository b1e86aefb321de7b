//! In-app notification repository.

use serde_json::Value;
use simtaq_common::ids::generate_id;
use simtaq_common::models::pengumuman::Notification;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert the same notification for many users in one statement.
pub async fn create_for_users(
    pool: &PgPool,
    user_ids: &[Uuid],
    title: &str,
    message: &str,
    kind: &str,
    data: Option<&Value>,
) -> Result<u64, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let ids: Vec<Uuid> = user_ids.iter().map(|_| generate_id()).collect();
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, title, message, type, data, is_read, created_at)
        SELECT id, user_id, $3, $4, $5, $6, FALSE, NOW()
        FROM UNNEST($1::uuid[], $2::uuid[]) AS n(id, user_id)
        "#,
    )
    .bind(&ids)
    .bind(user_ids)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(data)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    unread_only: bool,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_unread(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Mark one notification read. Only the owner can.
pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
