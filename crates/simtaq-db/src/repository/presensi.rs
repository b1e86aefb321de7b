//! Attendance repository.

use chrono::NaiveDate;
use simtaq_common::models::presensi::{Presensi, PresensiRosterRow, PresensiStatus};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Every approved student of a class with their attendance on `tanggal`, if recorded.
pub async fn roster(
    pool: &PgPool,
    kelas_id: Uuid,
    tanggal: NaiveDate,
) -> Result<Vec<PresensiRosterRow>, sqlx::Error> {
    sqlx::query_as::<_, PresensiRosterRow>(
        r#"
        SELECT s.id AS siswa_id, u.name, s.nis, p.id AS presensi_id, p.status, p.keterangan
        FROM siswa s
        JOIN users u ON u.id = s.user_id
        LEFT JOIN presensi p ON p.siswa_id = s.id AND p.tanggal = $2
        WHERE s.kelas_id = $1 AND s.status = 'approved'
        ORDER BY u.name
        "#,
    )
    .bind(kelas_id)
    .bind(tanggal)
    .fetch_all(pool)
    .await
}

/// Insert or overwrite one student's attendance for a day.
pub async fn upsert(
    db: impl PgExecutor<'_>,
    id: Uuid,
    siswa_id: Uuid,
    guru_id: Uuid,
    tanggal: NaiveDate,
    status: PresensiStatus,
    keterangan: Option<&str>,
) -> Result<Presensi, sqlx::Error> {
    sqlx::query_as::<_, Presensi>(
        r#"
        INSERT INTO presensi (id, siswa_id, guru_id, tanggal, status, keterangan, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        ON CONFLICT (siswa_id, tanggal) DO UPDATE SET
            status = EXCLUDED.status,
            keterangan = EXCLUDED.keterangan,
            guru_id = EXCLUDED.guru_id,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(siswa_id)
    .bind(guru_id)
    .bind(tanggal)
    .bind(status)
    .bind(keterangan)
    .fetch_one(db)
    .await
}

/// A student's attendance in a date range, newest first.
pub async fn list_for_siswa(
    pool: &PgPool,
    siswa_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Presensi>, sqlx::Error> {
    sqlx::query_as::<_, Presensi>(
        r#"
        SELECT * FROM presensi
        WHERE siswa_id = $1
          AND ($2::date IS NULL OR tanggal >= $2)
          AND ($3::date IS NULL OR tanggal <= $3)
        ORDER BY tanggal DESC
        "#,
    )
    .bind(siswa_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Statuses recorded school-wide in a date range.
pub async fn statuses_between(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PresensiStatus>, sqlx::Error> {
    let rows: Vec<(PresensiStatus,)> =
        sqlx::query_as("SELECT status FROM presensi WHERE tanggal BETWEEN $1 AND $2")
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
