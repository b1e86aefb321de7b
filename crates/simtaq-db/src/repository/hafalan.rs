//! Hafalan deposits and their penilaian grades.

use chrono::NaiveDate;
use simtaq_common::models::hafalan::{Hafalan, Penilaian, PenilaianDetail, SurahTambahan};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const DETAIL_SELECT: &str = r#"
    SELECT p.id, p.hafalan_id, p.siswa_id, us.name AS siswa_nama, p.guru_id, ug.name AS guru_nama,
           h.tanggal, h.juz, h.surah, h.ayat_mulai, h.ayat_selesai, h.surah_tambahan,
           p.tajwid, p.kelancaran, p.makhraj, p.adab, p.nilai_akhir, p.catatan, p.created_at
    FROM penilaian p
    JOIN hafalan h ON h.id = p.hafalan_id
    JOIN siswa s ON s.id = p.siswa_id
    JOIN users us ON us.id = s.user_id
    JOIN guru g ON g.id = p.guru_id
    JOIN users ug ON ug.id = g.user_id
"#;

#[derive(Debug, Clone)]
pub struct NewHafalan<'a> {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub guru_id: Uuid,
    pub tanggal: NaiveDate,
    pub juz: i32,
    pub surah: &'a str,
    pub surah_number: Option<i32>,
    pub ayat_mulai: i32,
    pub ayat_selesai: i32,
    pub surah_tambahan: Vec<SurahTambahan>,
    pub keterangan: Option<&'a str>,
}

pub async fn create_hafalan(db: impl PgExecutor<'_>, h: NewHafalan<'_>) -> Result<Hafalan, sqlx::Error> {
    sqlx::query_as::<_, Hafalan>(
        r#"
        INSERT INTO hafalan (id, siswa_id, guru_id, tanggal, juz, surah, surah_number,
                             ayat_mulai, ayat_selesai, surah_tambahan, keterangan, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
        RETURNING *
        "#,
    )
    .bind(h.id)
    .bind(h.siswa_id)
    .bind(h.guru_id)
    .bind(h.tanggal)
    .bind(h.juz)
    .bind(h.surah)
    .bind(h.surah_number)
    .bind(h.ayat_mulai)
    .bind(h.ayat_selesai)
    .bind(Json(h.surah_tambahan))
    .bind(h.keterangan)
    .fetch_one(db)
    .await
}

/// Replace the recited range of an existing deposit.
pub async fn update_hafalan(
    db: impl PgExecutor<'_>,
    id: Uuid,
    h: NewHafalan<'_>,
) -> Result<Hafalan, sqlx::Error> {
    sqlx::query_as::<_, Hafalan>(
        r#"
        UPDATE hafalan SET
            tanggal = $2, juz = $3, surah = $4, surah_number = $5,
            ayat_mulai = $6, ayat_selesai = $7, surah_tambahan = $8, keterangan = $9
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(h.tanggal)
    .bind(h.juz)
    .bind(h.surah)
    .bind(h.surah_number)
    .bind(h.ayat_mulai)
    .bind(h.ayat_selesai)
    .bind(Json(h.surah_tambahan))
    .bind(h.keterangan)
    .fetch_one(db)
    .await
}

pub async fn find_hafalan(pool: &PgPool, id: Uuid) -> Result<Option<Hafalan>, sqlx::Error> {
    sqlx::query_as::<_, Hafalan>("SELECT * FROM hafalan WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every deposit of a student, newest first.
pub async fn list_for_siswa(db: impl PgExecutor<'_>, siswa_id: Uuid) -> Result<Vec<Hafalan>, sqlx::Error> {
    sqlx::query_as::<_, Hafalan>(
        "SELECT * FROM hafalan WHERE siswa_id = $1 ORDER BY tanggal DESC, created_at DESC",
    )
    .bind(siswa_id)
    .fetch_all(db)
    .await
}

pub async fn count_since(pool: &PgPool, since: NaiveDate) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hafalan WHERE tanggal >= $1")
        .bind(since)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

#[derive(Debug, Clone, Copy)]
pub struct Scores {
    pub tajwid: f64,
    pub kelancaran: f64,
    pub makhraj: f64,
    pub adab: f64,
    pub nilai_akhir: f64,
}

pub async fn create_penilaian(
    db: impl PgExecutor<'_>,
    id: Uuid,
    hafalan: &Hafalan,
    scores: Scores,
    catatan: Option<&str>,
) -> Result<Penilaian, sqlx::Error> {
    sqlx::query_as::<_, Penilaian>(
        r#"
        INSERT INTO penilaian (id, hafalan_id, siswa_id, guru_id, tajwid, kelancaran, makhraj,
                               adab, nilai_akhir, catatan, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(hafalan.id)
    .bind(hafalan.siswa_id)
    .bind(hafalan.guru_id)
    .bind(scores.tajwid)
    .bind(scores.kelancaran)
    .bind(scores.makhraj)
    .bind(scores.adab)
    .bind(scores.nilai_akhir)
    .bind(catatan)
    .fetch_one(db)
    .await
}

pub async fn update_penilaian(
    db: impl PgExecutor<'_>,
    id: Uuid,
    scores: Scores,
    catatan: Option<&str>,
) -> Result<Penilaian, sqlx::Error> {
    sqlx::query_as::<_, Penilaian>(
        r#"
        UPDATE penilaian SET
            tajwid = $2, kelancaran = $3, makhraj = $4, adab = $5, nilai_akhir = $6,
            catatan = COALESCE($7, catatan), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(scores.tajwid)
    .bind(scores.kelancaran)
    .bind(scores.makhraj)
    .bind(scores.adab)
    .bind(scores.nilai_akhir)
    .bind(catatan)
    .fetch_one(db)
    .await
}

pub async fn find_penilaian(pool: &PgPool, id: Uuid) -> Result<Option<Penilaian>, sqlx::Error> {
    sqlx::query_as::<_, Penilaian>("SELECT * FROM penilaian WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_penilaian_detail(pool: &PgPool, id: Uuid) -> Result<Option<PenilaianDetail>, sqlx::Error> {
    sqlx::query_as::<_, PenilaianDetail>(&format!("{DETAIL_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Delete a grade together with its deposit.
pub async fn delete_penilaian(pool: &PgPool, penilaian: &Penilaian) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM hafalan WHERE id = $1")
        .bind(penilaian.hafalan_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Grades given by a teacher, optionally for one student.
pub async fn list_penilaian_by_guru(
    pool: &PgPool,
    guru_id: Uuid,
    siswa_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PenilaianDetail>, sqlx::Error> {
    sqlx::query_as::<_, PenilaianDetail>(&format!(
        "{DETAIL_SELECT} WHERE p.guru_id = $1 AND ($2::uuid IS NULL OR p.siswa_id = $2) \
         ORDER BY h.tanggal DESC, p.created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(guru_id)
    .bind(siswa_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_penilaian_by_guru(
    pool: &PgPool,
    guru_id: Uuid,
    siswa_id: Option<Uuid>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM penilaian WHERE guru_id = $1 AND ($2::uuid IS NULL OR siswa_id = $2)",
    )
    .bind(guru_id)
    .bind(siswa_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn list_penilaian_for_siswa(
    pool: &PgPool,
    siswa_id: Uuid,
) -> Result<Vec<PenilaianDetail>, sqlx::Error> {
    sqlx::query_as::<_, PenilaianDetail>(&format!(
        "{DETAIL_SELECT} WHERE p.siswa_id = $1 ORDER BY h.tanggal DESC, p.created_at DESC"
    ))
    .bind(siswa_id)
    .fetch_all(pool)
    .await
}

/// Mean final grade of a student, if graded at all.
pub async fn average_for_siswa(pool: &PgPool, siswa_id: Uuid) -> Result<Option<f64>, sqlx::Error> {
    let row: (Option<f64>,) = sqlx::query_as("SELECT AVG(nilai_akhir) FROM penilaian WHERE siswa_id = $1")
        .bind(siswa_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
