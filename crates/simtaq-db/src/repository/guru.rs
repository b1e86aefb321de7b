//! Teacher repository.

use chrono::NaiveDate;
use simtaq_common::models::academic::Kelas;
use simtaq_common::models::people::{Guru, GuruDetail, JenisKelamin};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::postgres::like_pattern;

const DETAIL_SELECT: &str = r#"
    SELECT g.id, g.user_id, u.username, u.name, u.email, u.is_active,
           g.nip, g.jenis_kelamin, g.tanggal_lahir, g.no_telepon, g.alamat, g.ttd_url
    FROM guru g
    JOIN users u ON u.id = g.user_id
"#;

#[derive(Debug, Clone)]
pub struct GuruFields<'a> {
    pub nip: Option<&'a str>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub no_telepon: Option<&'a str>,
    pub alamat: Option<&'a str>,
}

pub async fn create(
    db: impl PgExecutor<'_>,
    id: Uuid,
    user_id: Uuid,
    fields: GuruFields<'_>,
) -> Result<Guru, sqlx::Error> {
    sqlx::query_as::<_, Guru>(
        r#"
        INSERT INTO guru (id, user_id, nip, jenis_kelamin, tanggal_lahir, no_telepon, alamat, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(fields.nip)
    .bind(fields.jenis_kelamin)
    .bind(fields.tanggal_lahir)
    .bind(fields.no_telepon)
    .bind(fields.alamat)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Guru>, sqlx::Error> {
    sqlx::query_as::<_, Guru>("SELECT * FROM guru WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Guru>, sqlx::Error> {
    sqlx::query_as::<_, Guru>("SELECT * FROM guru WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<GuruDetail>, sqlx::Error> {
    sqlx::query_as::<_, GuruDetail>(&format!("{DETAIL_SELECT} WHERE g.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool, search: Option<&str>) -> Result<Vec<GuruDetail>, sqlx::Error> {
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    sqlx::query_as::<_, GuruDetail>(&format!(
        "{DETAIL_SELECT} WHERE ($1::text IS NULL OR u.name ILIKE $1 OR g.nip ILIKE $1 OR u.username ILIKE $1) ORDER BY u.name"
    ))
    .bind(pattern)
    .fetch_all(pool)
    .await
}

/// Active teachers, for the tasmi' registration form.
pub async fn list_active(pool: &PgPool) -> Result<Vec<GuruDetail>, sqlx::Error> {
    sqlx::query_as::<_, GuruDetail>(&format!("{DETAIL_SELECT} WHERE u.is_active ORDER BY u.name"))
        .fetch_all(pool)
        .await
}

pub async fn update(
    db: impl PgExecutor<'_>,
    id: Uuid,
    fields: GuruFields<'_>,
) -> Result<Guru, sqlx::Error> {
    sqlx::query_as::<_, Guru>(
        r#"
        UPDATE guru SET
            nip = COALESCE($2, nip),
            jenis_kelamin = COALESCE($3, jenis_kelamin),
            tanggal_lahir = COALESCE($4, tanggal_lahir),
            no_telepon = COALESCE($5, no_telepon),
            alamat = COALESCE($6, alamat)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(fields.nip)
    .bind(fields.jenis_kelamin)
    .bind(fields.tanggal_lahir)
    .bind(fields.no_telepon)
    .bind(fields.alamat)
    .fetch_one(db)
    .await
}

pub async fn set_ttd(pool: &PgPool, id: Uuid, ttd_url: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE guru SET ttd_url = $2 WHERE id = $1")
        .bind(id)
        .bind(ttd_url)
        .execute(pool)
        .await?;
    Ok(())
}

/// Active classes the teacher is assigned to.
pub async fn kelas_of(pool: &PgPool, guru_id: Uuid) -> Result<Vec<Kelas>, sqlx::Error> {
    sqlx::query_as::<_, Kelas>(
        r#"
        SELECT k.* FROM kelas k
        JOIN guru_kelas gk ON gk.kelas_id = k.id
        WHERE gk.guru_id = $1 AND gk.is_active AND k.is_active
        ORDER BY k.nama
        "#,
    )
    .bind(guru_id)
    .fetch_all(pool)
    .await
}

/// Whether the teacher is actively assigned to the class.
pub async fn teaches_kelas(pool: &PgPool, guru_id: Uuid, kelas_id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM guru_kelas WHERE guru_id = $1 AND kelas_id = $2 AND is_active)",
    )
    .bind(guru_id)
    .bind(kelas_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
