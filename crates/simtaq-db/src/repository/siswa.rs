//! Student repository.

use chrono::NaiveDate;
use simtaq_common::models::people::{JenisKelamin, Siswa, SiswaDetail, StatusSiswa, ValidationStatus};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::postgres::like_pattern;

const DETAIL_SELECT: &str = r#"
    SELECT s.id, s.user_id, u.username, u.name, u.email, u.is_active,
           s.nis, s.nisn, s.jenis_kelamin, s.tanggal_lahir, s.alamat, s.no_telepon,
           s.kelas_id, k.nama AS kelas_nama, s.status, s.status_siswa, s.tanggal_keluar,
           s.latest_juz_achieved, s.created_at
    FROM siswa s
    JOIN users u ON u.id = s.user_id
    LEFT JOIN kelas k ON k.id = s.kelas_id
"#;

const FILTER_WHERE: &str = r#"
    WHERE ($1::text IS NULL OR s.status = $1)
      AND ($2::uuid IS NULL OR s.kelas_id = $2)
      AND ($3::text IS NULL OR s.status_siswa = $3)
      AND ($4::text IS NULL OR u.name ILIKE $4 OR s.nis ILIKE $4)
"#;

#[derive(Debug, Clone, Default)]
pub struct SiswaFilter {
    pub status: Option<ValidationStatus>,
    pub kelas_id: Option<Uuid>,
    pub status_siswa: Option<StatusSiswa>,
    pub search: Option<String>,
}

impl SiswaFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern)
    }
}

#[derive(Debug, Clone)]
pub struct NewSiswa<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nis: &'a str,
    pub nisn: Option<&'a str>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: NaiveDate,
    pub alamat: Option<&'a str>,
    pub no_telepon: Option<&'a str>,
    pub kelas_id: Option<Uuid>,
    pub status: ValidationStatus,
}

pub async fn create(db: impl PgExecutor<'_>, siswa: NewSiswa<'_>) -> Result<Siswa, sqlx::Error> {
    sqlx::query_as::<_, Siswa>(
        r#"
        INSERT INTO siswa (id, user_id, nis, nisn, jenis_kelamin, tanggal_lahir, alamat,
                           no_telepon, kelas_id, status, status_siswa, latest_juz_achieved, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'AKTIF', 0, NOW())
        RETURNING *
        "#,
    )
    .bind(siswa.id)
    .bind(siswa.user_id)
    .bind(siswa.nis)
    .bind(siswa.nisn)
    .bind(siswa.jenis_kelamin)
    .bind(siswa.tanggal_lahir)
    .bind(siswa.alamat)
    .bind(siswa.no_telepon)
    .bind(siswa.kelas_id)
    .bind(siswa.status)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Siswa>, sqlx::Error> {
    sqlx::query_as::<_, Siswa>("SELECT * FROM siswa WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Siswa>, sqlx::Error> {
    sqlx::query_as::<_, Siswa>("SELECT * FROM siswa WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn nis_exists(db: impl PgExecutor<'_>, nis: &str) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM siswa WHERE nis = $1)")
        .bind(nis)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<SiswaDetail>, sqlx::Error> {
    sqlx::query_as::<_, SiswaDetail>(&format!("{DETAIL_SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    filter: &SiswaFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<SiswaDetail>, sqlx::Error> {
    sqlx::query_as::<_, SiswaDetail>(&format!(
        "{DETAIL_SELECT} {FILTER_WHERE} ORDER BY u.name LIMIT $5 OFFSET $6"
    ))
    .bind(filter.status)
    .bind(filter.kelas_id)
    .bind(filter.status_siswa)
    .bind(filter.search_pattern())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool, filter: &SiswaFilter) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM siswa s JOIN users u ON u.id = s.user_id {FILTER_WHERE}"
    ))
    .bind(filter.status)
    .bind(filter.kelas_id)
    .bind(filter.status_siswa)
    .bind(filter.search_pattern())
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Approved students of a class, by name.
pub async fn list_by_kelas(pool: &PgPool, kelas_id: Uuid) -> Result<Vec<SiswaDetail>, sqlx::Error> {
    sqlx::query_as::<_, SiswaDetail>(&format!(
        "{DETAIL_SELECT} WHERE s.kelas_id = $1 AND s.status = 'approved' ORDER BY u.name"
    ))
    .bind(kelas_id)
    .fetch_all(pool)
    .await
}

pub struct SiswaUpdate<'a> {
    pub nisn: Option<&'a str>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub alamat: Option<&'a str>,
    pub no_telepon: Option<&'a str>,
}

pub async fn update(db: impl PgExecutor<'_>, id: Uuid, data: SiswaUpdate<'_>) -> Result<Siswa, sqlx::Error> {
    sqlx::query_as::<_, Siswa>(
        r#"
        UPDATE siswa SET
            nisn = COALESCE($2, nisn),
            jenis_kelamin = COALESCE($3, jenis_kelamin),
            tanggal_lahir = COALESCE($4, tanggal_lahir),
            alamat = COALESCE($5, alamat),
            no_telepon = COALESCE($6, no_telepon)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(data.nisn)
    .bind(data.jenis_kelamin)
    .bind(data.tanggal_lahir)
    .bind(data.alamat)
    .bind(data.no_telepon)
    .fetch_one(db)
    .await
}

/// Change life-cycle status. `tanggal_keluar` is stamped when leaving and cleared on return.
pub async fn set_status_siswa(
    db: impl PgExecutor<'_>,
    id: Uuid,
    status: StatusSiswa,
) -> Result<Siswa, sqlx::Error> {
    sqlx::query_as::<_, Siswa>(
        r#"
        UPDATE siswa SET
            status_siswa = $2,
            tanggal_keluar = CASE WHEN $2 = 'AKTIF' THEN NULL ELSE COALESCE(tanggal_keluar, NOW()) END
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn set_validation_status(
    db: impl PgExecutor<'_>,
    id: Uuid,
    status: ValidationStatus,
) -> Result<Siswa, sqlx::Error> {
    sqlx::query_as::<_, Siswa>("UPDATE siswa SET status = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(status)
        .fetch_one(db)
        .await
}

pub async fn set_kelas(
    pool: &PgPool,
    id: Uuid,
    kelas_id: Option<Uuid>,
) -> Result<Option<Siswa>, sqlx::Error> {
    sqlx::query_as::<_, Siswa>("UPDATE siswa SET kelas_id = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(kelas_id)
        .fetch_optional(pool)
        .await
}

pub async fn set_latest_juz(db: impl PgExecutor<'_>, id: Uuid, juz: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE siswa SET latest_juz_achieved = $2 WHERE id = $1")
        .bind(id)
        .bind(juz)
        .execute(db)
        .await?;
    Ok(())
}
