//! User repository: login accounts shared by every role.

use simtaq_common::models::user::{Role, User};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
    pub is_active: bool,
}

pub async fn create_user(db: impl PgExecutor<'_>, user: NewUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, name, email, password_hash, role, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(user.username)
    .bind(user.name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.role)
    .bind(user.is_active)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Every account with this username (case-insensitive). A student and a parent
/// may share one, so callers disambiguate by password or role.
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(username) = LOWER($1) ORDER BY created_at",
    )
    .bind(username.trim())
    .fetch_all(pool)
    .await
}

pub async fn find_by_username_and_role(
    pool: &PgPool,
    username: &str,
    role: Role,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1) AND role = $2")
        .bind(username.trim())
        .bind(role)
        .fetch_optional(pool)
        .await
}

pub async fn username_taken(
    db: impl PgExecutor<'_>,
    username: &str,
    role: Role,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND role = $2)",
    )
    .bind(username)
    .bind(role)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

/// Usernames of all teacher accounts starting with `G`.
pub async fn guru_usernames(db: impl PgExecutor<'_>) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT username FROM users WHERE role = 'GURU' AND username LIKE 'G%'")
            .fetch_all(db)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Update display name and email; `None` keeps the current value.
pub async fn update_profile(
    db: impl PgExecutor<'_>,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .fetch_one(db)
    .await
}

pub async fn update_password(
    db: impl PgExecutor<'_>,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_active(db: impl PgExecutor<'_>, id: Uuid, is_active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(is_active)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_recovery_code(
    db: impl PgExecutor<'_>,
    id: Uuid,
    recovery_code_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users SET
            recovery_code_hash = $2,
            recovery_code_created_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(recovery_code_hash)
    .execute(db)
    .await?;
    Ok(())
}

/// Delete an account. Profiles cascade.
pub async fn delete_user(db: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Ids of active users with one of the given roles.
pub async fn active_ids_by_roles(pool: &PgPool, roles: &[Role]) -> Result<Vec<Uuid>, sqlx::Error> {
    let roles: Vec<&str> = roles.iter().map(Role::as_str).collect();
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE is_active AND role = ANY($1)")
            .bind(roles)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
