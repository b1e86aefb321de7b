//! Report queries. Rows are scoped by the student's current class.

use chrono::NaiveDate;
use simtaq_common::models::laporan::{AttendanceMark, CatatanSemester, GradedDeposit, RosterEntry};
use sqlx::PgPool;
use uuid::Uuid;

/// Approved students of a class, by name.
pub async fn roster(pool: &PgPool, kelas_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error> {
    sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT s.id AS siswa_id, u.name AS nama, s.nis, s.latest_juz_achieved
        FROM siswa s
        JOIN users u ON u.id = s.user_id
        WHERE s.kelas_id = $1 AND s.status = 'approved'
        ORDER BY u.name
        "#,
    )
    .bind(kelas_id)
    .fetch_all(pool)
    .await
}

pub async fn attendance(
    pool: &PgPool,
    kelas_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttendanceMark>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceMark>(
        r#"
        SELECT p.siswa_id, p.tanggal, p.status
        FROM presensi p
        JOIN siswa s ON s.id = p.siswa_id
        WHERE s.kelas_id = $1 AND p.tanggal BETWEEN $2 AND $3
        "#,
    )
    .bind(kelas_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn graded_deposits(
    pool: &PgPool,
    kelas_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<GradedDeposit>, sqlx::Error> {
    sqlx::query_as::<_, GradedDeposit>(
        r#"
        SELECT h.siswa_id, h.tanggal, h.juz, h.surah,
               p.tajwid, p.kelancaran, p.makhraj, p.adab, p.nilai_akhir
        FROM penilaian p
        JOIN hafalan h ON h.id = p.hafalan_id
        JOIN siswa s ON s.id = h.siswa_id
        WHERE s.kelas_id = $1 AND h.tanggal BETWEEN $2 AND $3
        ORDER BY h.tanggal
        "#,
    )
    .bind(kelas_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Semester notes of every student in a class.
pub async fn catatan_for_kelas(
    pool: &PgPool,
    kelas_id: Uuid,
    semester: &str,
) -> Result<Vec<CatatanSemester>, sqlx::Error> {
    sqlx::query_as::<_, CatatanSemester>(
        r#"
        SELECT c.id, c.siswa_id, c.guru_id, c.semester, c.catatan, c.updated_at
        FROM catatan_semester c
        JOIN siswa s ON s.id = c.siswa_id
        WHERE s.kelas_id = $1 AND c.semester = $2
        "#,
    )
    .bind(kelas_id)
    .bind(semester)
    .fetch_all(pool)
    .await
}

/// Insert or overwrite a student's note for a semester.
pub async fn upsert_catatan(
    pool: &PgPool,
    id: Uuid,
    siswa_id: Uuid,
    guru_id: Uuid,
    semester: &str,
    catatan: &str,
) -> Result<CatatanSemester, sqlx::Error> {
    sqlx::query_as::<_, CatatanSemester>(
        r#"
        INSERT INTO catatan_semester (id, siswa_id, guru_id, semester, catatan, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        ON CONFLICT (siswa_id, semester) DO UPDATE SET
            catatan = EXCLUDED.catatan,
            guru_id = EXCLUDED.guru_id,
            updated_at = NOW()
        RETURNING id, siswa_id, guru_id, semester, catatan, updated_at
        "#,
    )
    .bind(id)
    .bind(siswa_id)
    .bind(guru_id)
    .bind(semester)
    .bind(catatan)
    .fetch_one(pool)
    .await
}
