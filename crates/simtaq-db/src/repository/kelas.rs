//! Class repository and teacher assignments.

use simtaq_common::models::academic::{GuruKelas, Kelas, KelasSummary, PeranGuru};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const SUMMARY_SELECT: &str = r#"
    SELECT k.id, k.nama, k.tahun_ajaran_id, t.nama AS tahun_ajaran_nama, k.target_juz, k.is_active,
           (SELECT COUNT(*) FROM siswa s WHERE s.kelas_id = k.id AND s.status = 'approved') AS jumlah_siswa,
           (SELECT u.name FROM guru_kelas gk
              JOIN guru g ON g.id = gk.guru_id
              JOIN users u ON u.id = g.user_id
             WHERE gk.kelas_id = k.id AND gk.peran = 'UTAMA' AND gk.is_active
             LIMIT 1) AS guru_utama
    FROM kelas k
    LEFT JOIN tahun_ajaran t ON t.id = k.tahun_ajaran_id
"#;

pub async fn list(pool: &PgPool, tahun_ajaran_id: Option<Uuid>) -> Result<Vec<KelasSummary>, sqlx::Error> {
    sqlx::query_as::<_, KelasSummary>(&format!(
        "{SUMMARY_SELECT} WHERE ($1::uuid IS NULL OR k.tahun_ajaran_id = $1) ORDER BY k.nama"
    ))
    .bind(tahun_ajaran_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Kelas>, sqlx::Error> {
    sqlx::query_as::<_, Kelas>("SELECT * FROM kelas WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    id: Uuid,
    nama: &str,
    tahun_ajaran_id: Option<Uuid>,
    target_juz: Option<i32>,
) -> Result<Kelas, sqlx::Error> {
    sqlx::query_as::<_, Kelas>(
        r#"
        INSERT INTO kelas (id, nama, tahun_ajaran_id, target_juz, is_active, created_at)
        VALUES ($1, $2, $3, $4, TRUE, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(nama)
    .bind(tahun_ajaran_id)
    .bind(target_juz)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    nama: &str,
    tahun_ajaran_id: Option<Uuid>,
    target_juz: Option<i32>,
) -> Result<Option<Kelas>, sqlx::Error> {
    sqlx::query_as::<_, Kelas>(
        r#"
        UPDATE kelas SET nama = $2, tahun_ajaran_id = $3, target_juz = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(nama)
    .bind(tahun_ajaran_id)
    .bind(target_juz)
    .fetch_optional(pool)
    .await
}

pub async fn toggle_active(pool: &PgPool, id: Uuid) -> Result<Option<Kelas>, sqlx::Error> {
    sqlx::query_as::<_, Kelas>("UPDATE kelas SET is_active = NOT is_active WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM kelas WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_students(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM siswa WHERE kelas_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn list_guru(pool: &PgPool, kelas_id: Uuid) -> Result<Vec<GuruKelas>, sqlx::Error> {
    sqlx::query_as::<_, GuruKelas>(
        r#"
        SELECT gk.id, gk.guru_id, gk.kelas_id, gk.peran, gk.is_active, u.name AS guru_nama
        FROM guru_kelas gk
        JOIN guru g ON g.id = gk.guru_id
        JOIN users u ON u.id = g.user_id
        WHERE gk.kelas_id = $1
        ORDER BY gk.peran DESC, u.name
        "#,
    )
    .bind(kelas_id)
    .fetch_all(pool)
    .await
}

/// Assign (or re-activate) a teacher in a class.
pub async fn assign_guru(
    db: impl PgExecutor<'_>,
    id: Uuid,
    guru_id: Uuid,
    kelas_id: Uuid,
    peran: PeranGuru,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO guru_kelas (id, guru_id, kelas_id, peran, is_active, created_at)
        VALUES ($1, $2, $3, $4, TRUE, NOW())
        ON CONFLICT (guru_id, kelas_id) DO UPDATE SET peran = EXCLUDED.peran, is_active = TRUE
        "#,
    )
    .bind(id)
    .bind(guru_id)
    .bind(kelas_id)
    .bind(peran)
    .execute(db)
    .await?;
    Ok(())
}

/// Demote the current main teacher so a new one can take over.
pub async fn demote_utama(db: impl PgExecutor<'_>, kelas_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE guru_kelas SET peran = 'PENDAMPING' WHERE kelas_id = $1 AND peran = 'UTAMA'")
        .bind(kelas_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn remove_guru(pool: &PgPool, kelas_id: Uuid, guru_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE guru_kelas SET is_active = FALSE WHERE kelas_id = $1 AND guru_id = $2")
        .bind(kelas_id)
        .bind(guru_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
