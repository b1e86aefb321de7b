//! Tasmi' registration repository.

use chrono::NaiveDate;
use simtaq_common::models::{
    people::JenisKelamin,
    tasmi::{Tasmi, TasmiDetail, TasmiResult, TasmiStatus},
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const DETAIL_SELECT: &str = r#"
    SELECT t.*, us.name AS siswa_nama, s.nis AS siswa_nis, k.nama AS kelas_nama,
           ugp.name AS guru_pengampu_nama, ugu.name AS guru_penguji_nama
    FROM tasmi t
    JOIN siswa s ON s.id = t.siswa_id
    JOIN users us ON us.id = s.user_id
    LEFT JOIN kelas k ON k.id = t.kelas_id
    JOIN guru gp ON gp.id = t.guru_pengampu_id
    JOIN users ugp ON ugp.id = gp.user_id
    LEFT JOIN guru gu ON gu.id = t.guru_penguji_id
    LEFT JOIN users ugu ON ugu.id = gu.user_id
"#;

const RESULT_SELECT: &str = r#"
    SELECT t.*, us.name AS siswa_nama, s.nis AS siswa_nis, k.nama AS kelas_nama,
           ugp.name AS guru_pengampu_nama, ugu.name AS guru_penguji_nama,
           s.jenis_kelamin, c.id AS certificate_id, c.certificate_number
    FROM tasmi t
    JOIN siswa s ON s.id = t.siswa_id
    JOIN users us ON us.id = s.user_id
    LEFT JOIN kelas k ON k.id = t.kelas_id
    JOIN guru gp ON gp.id = t.guru_pengampu_id
    JOIN users ugp ON ugp.id = gp.user_id
    LEFT JOIN guru gu ON gu.id = t.guru_penguji_id
    LEFT JOIN users ugu ON ugu.id = gu.user_id
    LEFT JOIN certificates c ON c.tasmi_id = t.id
"#;

#[derive(Debug, Clone)]
pub struct NewTasmi<'a> {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub kelas_id: Option<Uuid>,
    pub guru_pengampu_id: Uuid,
    pub jumlah_hafalan: i32,
    pub juz_yang_ditasmi: &'a str,
    pub jam_tasmi: &'a str,
    pub tanggal_tasmi: NaiveDate,
    pub catatan: Option<&'a str>,
}

pub async fn create(pool: &PgPool, t: NewTasmi<'_>) -> Result<Tasmi, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        INSERT INTO tasmi (id, siswa_id, kelas_id, guru_pengampu_id, jumlah_hafalan, juz_yang_ditasmi,
                           jam_tasmi, tanggal_tasmi, catatan, status_pendaftaran, tanggal_daftar, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'MENUNGGU', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(t.id)
    .bind(t.siswa_id)
    .bind(t.kelas_id)
    .bind(t.guru_pengampu_id)
    .bind(t.jumlah_hafalan)
    .bind(t.juz_yang_ditasmi)
    .bind(t.jam_tasmi)
    .bind(t.tanggal_tasmi)
    .bind(t.catatan)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Tasmi>, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>("SELECT * FROM tasmi WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!("{DETAIL_SELECT} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// A MENUNGGU or DISETUJUI registration of the student, if any.
pub async fn find_open_for_siswa(pool: &PgPool, siswa_id: Uuid) -> Result<Option<Tasmi>, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        SELECT * FROM tasmi
        WHERE siswa_id = $1 AND status_pendaftaran IN ('MENUNGGU', 'DISETUJUI')
        ORDER BY tanggal_daftar DESC
        LIMIT 1
        "#,
    )
    .bind(siswa_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_siswa(pool: &PgPool, siswa_id: Uuid) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE t.siswa_id = $1 ORDER BY t.tanggal_daftar DESC"
    ))
    .bind(siswa_id)
    .fetch_all(pool)
    .await
}

/// Published results of a student.
pub async fn list_published_for_siswa(pool: &PgPool, siswa_id: Uuid) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE t.siswa_id = $1 AND t.published_at IS NOT NULL ORDER BY t.published_at DESC"
    ))
    .bind(siswa_id)
    .fetch_all(pool)
    .await
}

/// Registrations a teacher handles, as pengampu or penguji.
pub async fn list_for_guru(
    pool: &PgPool,
    guru_id: Uuid,
    status: Option<TasmiStatus>,
) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE (t.guru_pengampu_id = $1 OR t.guru_penguji_id = $1) \
         AND ($2::text IS NULL OR t.status_pendaftaran = $2) ORDER BY t.tanggal_daftar DESC"
    ))
    .bind(guru_id)
    .bind(status)
    .fetch_all(pool)
    .await
}

/// Completed exams that passed, for certificate issuing.
pub async fn list_passed(pool: &PgPool) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE t.status_pendaftaran = 'SELESAI' AND t.is_passed ORDER BY t.updated_at DESC"
    ))
    .fetch_all(pool)
    .await
}

/// Registrations by registration date, for the overview.
pub async fn list_registered(
    pool: &PgPool,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE ($1::date IS NULL OR t.tanggal_daftar::date >= $1) \
         AND ($2::date IS NULL OR t.tanggal_daftar::date <= $2) ORDER BY t.tanggal_daftar DESC"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter<'a> {
    pub is_passed: Option<bool>,
    pub kelas_id: Option<Uuid>,
    /// Case-insensitive substring of the student name.
    pub search: Option<&'a str>,
    /// Year of `tanggal_ujian`.
    pub tahun: Option<i32>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub ids: Option<&'a [Uuid]>,
}

/// Completed exams with their certificate.
pub async fn list_results(pool: &PgPool, f: &ResultFilter<'_>) -> Result<Vec<TasmiResult>, sqlx::Error> {
    sqlx::query_as::<_, TasmiResult>(&format!(
        "{RESULT_SELECT} WHERE t.status_pendaftaran = 'SELESAI' \
         AND ($1::boolean IS NULL OR t.is_passed = $1) \
         AND ($2::uuid IS NULL OR t.kelas_id = $2) \
         AND ($3::text IS NULL OR us.name ILIKE '%' || $3 || '%') \
         AND ($4::int IS NULL OR EXTRACT(YEAR FROM t.tanggal_ujian)::int = $4) \
         AND ($5::text IS NULL OR s.jenis_kelamin = $5) \
         AND ($6::uuid[] IS NULL OR t.id = ANY($6)) \
         ORDER BY t.tanggal_ujian DESC NULLS LAST, us.name"
    ))
    .bind(f.is_passed)
    .bind(f.kelas_id)
    .bind(f.search)
    .bind(f.tahun)
    .bind(f.jenis_kelamin)
    .bind(f.ids)
    .fetch_all(pool)
    .await
}

/// Passed exams to print, grouped by class then name.
pub async fn list_for_certificates(pool: &PgPool, f: &ResultFilter<'_>) -> Result<Vec<TasmiResult>, sqlx::Error> {
    let mut rows = list_results(pool, &ResultFilter { is_passed: Some(true), ..f.clone() }).await?;
    rows.sort_by(|a, b| {
        (a.detail.kelas_nama.as_deref(), a.detail.siswa_nama.as_str())
            .cmp(&(b.detail.kelas_nama.as_deref(), b.detail.siswa_nama.as_str()))
    });
    Ok(rows)
}

/// Graded exams a teacher handles with the exam date in range.
pub async fn list_graded_for_guru(
    pool: &PgPool,
    guru_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    kelas_id: Option<Uuid>,
) -> Result<Vec<TasmiDetail>, sqlx::Error> {
    sqlx::query_as::<_, TasmiDetail>(&format!(
        "{DETAIL_SELECT} WHERE (t.guru_pengampu_id = $1 OR t.guru_penguji_id = $1) \
         AND t.status_pendaftaran = 'SELESAI' AND t.nilai_akhir IS NOT NULL \
         AND t.tanggal_ujian BETWEEN $2 AND $3 \
         AND ($4::uuid IS NULL OR t.kelas_id = $4) \
         ORDER BY t.tanggal_ujian, us.name"
    ))
    .bind(guru_id)
    .bind(from)
    .bind(to)
    .bind(kelas_id)
    .fetch_all(pool)
    .await
}

pub async fn approve(
    pool: &PgPool,
    id: Uuid,
    guru_id: Uuid,
    tanggal_ujian: NaiveDate,
    catatan: Option<&str>,
) -> Result<Tasmi, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        UPDATE tasmi SET
            status_pendaftaran = 'DISETUJUI',
            guru_verifikasi_id = $2,
            guru_penguji_id = COALESCE(guru_penguji_id, $2),
            tanggal_ujian = $3,
            catatan = COALESCE($4, catatan),
            catatan_penolakan = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(guru_id)
    .bind(tanggal_ujian)
    .bind(catatan)
    .fetch_one(pool)
    .await
}

pub async fn reject(pool: &PgPool, id: Uuid, guru_id: Uuid, catatan_penolakan: &str) -> Result<Tasmi, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        UPDATE tasmi SET
            status_pendaftaran = 'DITOLAK',
            guru_verifikasi_id = $2,
            catatan_penolakan = $3,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(guru_id)
    .bind(catatan_penolakan)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone)]
pub struct TasmiGrade<'a> {
    pub guru_penguji_id: Uuid,
    pub nilai_kelancaran: f64,
    pub nilai_tajwid: f64,
    pub nilai_adab: f64,
    pub nilai_irama: f64,
    pub nilai_akhir: f64,
    pub predikat: &'a str,
    pub is_passed: bool,
    pub catatan_penguji: Option<&'a str>,
    pub publish: bool,
}

/// Store exam scores and mark SELESAI; optionally publish in the same update.
pub async fn grade(pool: &PgPool, id: Uuid, g: TasmiGrade<'_>) -> Result<Tasmi, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        UPDATE tasmi SET
            status_pendaftaran = 'SELESAI',
            guru_penguji_id = $2,
            nilai_kelancaran = $3,
            nilai_tajwid = $4,
            nilai_adab = $5,
            nilai_irama = $6,
            nilai_akhir = $7,
            predikat = $8,
            is_passed = $9,
            catatan_penguji = $10,
            published_at = CASE WHEN $11 THEN NOW() ELSE published_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(g.guru_penguji_id)
    .bind(g.nilai_kelancaran)
    .bind(g.nilai_tajwid)
    .bind(g.nilai_adab)
    .bind(g.nilai_irama)
    .bind(g.nilai_akhir)
    .bind(g.predikat)
    .bind(g.is_passed)
    .bind(g.catatan_penguji)
    .bind(g.publish)
    .fetch_one(pool)
    .await
}

pub async fn publish(pool: &PgPool, id: Uuid) -> Result<Tasmi, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        "UPDATE tasmi SET published_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Cancel a registration still waiting for review.
pub async fn cancel(db: impl PgExecutor<'_>, id: Uuid, siswa_id: Uuid) -> Result<Option<Tasmi>, sqlx::Error> {
    sqlx::query_as::<_, Tasmi>(
        r#"
        UPDATE tasmi SET status_pendaftaran = 'DIBATALKAN', updated_at = NOW()
        WHERE id = $1 AND siswa_id = $2 AND status_pendaftaran = 'MENUNGGU'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(siswa_id)
    .fetch_optional(db)
    .await
}
