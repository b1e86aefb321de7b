//! School year repository.

use simtaq_common::models::academic::{TahunAjaran, TahunAjaranRequest};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn list(pool: &PgPool) -> Result<Vec<TahunAjaran>, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>(
        "SELECT * FROM tahun_ajaran ORDER BY tanggal_mulai DESC, semester DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<TahunAjaran>, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>("SELECT * FROM tahun_ajaran WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_active(pool: &PgPool) -> Result<Option<TahunAjaran>, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>("SELECT * FROM tahun_ajaran WHERE is_active LIMIT 1")
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, id: Uuid, req: &TahunAjaranRequest) -> Result<TahunAjaran, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>(
        r#"
        INSERT INTO tahun_ajaran (id, nama, semester, tanggal_mulai, tanggal_selesai, target_hafalan, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.nama.trim())
    .bind(req.semester)
    .bind(req.tanggal_mulai)
    .bind(req.tanggal_selesai)
    .bind(req.target_hafalan)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: &TahunAjaranRequest,
) -> Result<Option<TahunAjaran>, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>(
        r#"
        UPDATE tahun_ajaran SET
            nama = $2, semester = $3, tanggal_mulai = $4, tanggal_selesai = $5, target_hafalan = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.nama.trim())
    .bind(req.semester)
    .bind(req.tanggal_mulai)
    .bind(req.tanggal_selesai)
    .bind(req.target_hafalan)
    .fetch_optional(pool)
    .await
}

/// Make one school year the only active one.
pub async fn activate(pool: &PgPool, id: Uuid) -> Result<Option<TahunAjaran>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE tahun_ajaran SET is_active = FALSE WHERE is_active AND id <> $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let activated = sqlx::query_as::<_, TahunAjaran>(
        "UPDATE tahun_ajaran SET is_active = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    if activated.is_some() {
        tx.commit().await?;
    } else {
        tx.rollback().await?;
    }
    Ok(activated)
}

pub async fn set_target(pool: &PgPool, id: Uuid, target_hafalan: i32) -> Result<Option<TahunAjaran>, sqlx::Error> {
    sqlx::query_as::<_, TahunAjaran>(
        "UPDATE tahun_ajaran SET target_hafalan = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(target_hafalan)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tahun_ajaran WHERE id = $1 AND NOT is_active")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
