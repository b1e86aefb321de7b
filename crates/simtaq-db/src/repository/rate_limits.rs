//! Attempt counters with a lock deadline, keyed by an arbitrary string.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RateLimit {
    pub key: String,
    pub attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RateLimit {
    /// Remaining lock time, if locked at `now`.
    pub fn locked_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

pub async fn find(pool: &PgPool, key: &str) -> Result<Option<RateLimit>, sqlx::Error> {
    sqlx::query_as::<_, RateLimit>("SELECT * FROM rate_limits WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

/// Count a failed attempt. Attempts older than `window` start a new count;
/// reaching `max_attempts` locks the key for `window`.
pub async fn record_failure(
    pool: &PgPool,
    key: &str,
    max_attempts: i32,
    window: Duration,
) -> Result<RateLimit, sqlx::Error> {
    let window_secs = window.num_seconds() as f64;
    sqlx::query_as::<_, RateLimit>(
        r#"
        INSERT INTO rate_limits (key, attempts, locked_until, updated_at)
        VALUES ($1, 1, CASE WHEN 1 >= $2 THEN NOW() + make_interval(secs => $3) END, NOW())
        ON CONFLICT (key) DO UPDATE SET
            attempts = CASE
                WHEN rate_limits.updated_at < NOW() - make_interval(secs => $3) THEN 1
                ELSE rate_limits.attempts + 1
            END,
            locked_until = CASE
                WHEN (CASE
                        WHEN rate_limits.updated_at < NOW() - make_interval(secs => $3) THEN 1
                        ELSE rate_limits.attempts + 1
                      END) >= $2
                THEN NOW() + make_interval(secs => $3)
                ELSE NULL
            END,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(key)
    .bind(max_attempts)
    .bind(window_secs)
    .fetch_one(pool)
    .await
}

pub async fn clear(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rate_limits WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_remaining() {
        let now = Utc::now();
        let mut limit = RateLimit {
            key: "reset-password:127.0.0.1:budi".into(),
            attempts: 5,
            locked_until: Some(now + Duration::minutes(10)),
            updated_at: now,
        };
        assert_eq!(limit.locked_for(now), Some(Duration::minutes(10)));
        limit.locked_until = Some(now - Duration::seconds(1));
        assert_eq!(limit.locked_for(now), None);
    }
}
