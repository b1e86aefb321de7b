//! Announcement repository.

use simtaq_common::models::pengumuman::{Pengumuman, PengumumanRequest};
use simtaq_common::models::user::Role;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn list_all(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Pengumuman>, sqlx::Error> {
    sqlx::query_as::<_, Pengumuman>(
        "SELECT * FROM pengumuman ORDER BY is_pinned DESC, created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pengumuman")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Announcements visible to a role today: untargeted or targeted at the role,
/// inside their validity window. Pinned first.
pub async fn list_visible(pool: &PgPool, role: Role, limit: i64) -> Result<Vec<Pengumuman>, sqlx::Error> {
    sqlx::query_as::<_, Pengumuman>(
        r#"
        SELECT * FROM pengumuman
        WHERE (target_role IS NULL OR target_role = $1)
          AND (tanggal_mulai IS NULL OR tanggal_mulai <= CURRENT_DATE)
          AND (tanggal_selesai IS NULL OR tanggal_selesai >= CURRENT_DATE)
        ORDER BY is_pinned DESC, created_at DESC
        LIMIT $2
        "#,
    )
    .bind(role)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pengumuman>, sqlx::Error> {
    sqlx::query_as::<_, Pengumuman>("SELECT * FROM pengumuman WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    id: Uuid,
    created_by: Uuid,
    req: &PengumumanRequest,
) -> Result<Pengumuman, sqlx::Error> {
    sqlx::query_as::<_, Pengumuman>(
        r#"
        INSERT INTO pengumuman (id, judul, isi, kategori, target_role, tanggal_mulai, tanggal_selesai,
                                is_pinned, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.judul.trim())
    .bind(req.isi.trim())
    .bind(req.kategori.as_deref())
    .bind(req.target_role)
    .bind(req.tanggal_mulai)
    .bind(req.tanggal_selesai)
    .bind(req.is_pinned)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, req: &PengumumanRequest) -> Result<Option<Pengumuman>, sqlx::Error> {
    sqlx::query_as::<_, Pengumuman>(
        r#"
        UPDATE pengumuman SET
            judul = $2, isi = $3, kategori = $4, target_role = $5,
            tanggal_mulai = $6, tanggal_selesai = $7, is_pinned = $8, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.judul.trim())
    .bind(req.isi.trim())
    .bind(req.kategori.as_deref())
    .bind(req.target_role)
    .bind(req.tanggal_mulai)
    .bind(req.tanggal_selesai)
    .bind(req.is_pinned)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pengumuman WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
