//! Web Push subscription repository.

use simtaq_common::models::pengumuman::PushSubscription;
use simtaq_common::models::user::Role;
use sqlx::PgPool;
use uuid::Uuid;

/// Register an endpoint for a user. An endpoint already known (possibly for
/// another user on a shared device) is re-assigned and re-activated.
pub async fn upsert(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
    user_agent: Option<&str>,
) -> Result<PushSubscription, sqlx::Error> {
    sqlx::query_as::<_, PushSubscription>(
        r#"
        INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, user_agent, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, NOW(), NOW())
        ON CONFLICT (endpoint) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            p256dh = EXCLUDED.p256dh,
            auth = EXCLUDED.auth,
            user_agent = EXCLUDED.user_agent,
            is_active = TRUE,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .bind(user_agent)
    .fetch_one(pool)
    .await
}

/// Deactivate a user's subscription by endpoint.
pub async fn deactivate_endpoint(pool: &PgPool, user_id: Uuid, endpoint: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE push_subscriptions SET is_active = FALSE, updated_at = NOW() WHERE user_id = $1 AND endpoint = $2",
    )
    .bind(user_id)
    .bind(endpoint)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn deactivate_many(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE push_subscriptions SET is_active = FALSE, updated_at = NOW() WHERE id = ANY($1)",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn active_for_users(pool: &PgPool, user_ids: &[Uuid]) -> Result<Vec<PushSubscription>, sqlx::Error> {
    sqlx::query_as::<_, PushSubscription>(
        "SELECT * FROM push_subscriptions WHERE is_active AND user_id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await
}

/// Active subscriptions of active users with one of the roles.
pub async fn active_for_roles(pool: &PgPool, roles: &[Role]) -> Result<Vec<PushSubscription>, sqlx::Error> {
    let roles: Vec<&str> = roles.iter().map(Role::as_str).collect();
    sqlx::query_as::<_, PushSubscription>(
        r#"
        SELECT p.* FROM push_subscriptions p
        JOIN users u ON u.id = p.user_id
        WHERE p.is_active AND u.is_active AND u.role = ANY($1)
        "#,
    )
    .bind(roles)
    .fetch_all(pool)
    .await
}
