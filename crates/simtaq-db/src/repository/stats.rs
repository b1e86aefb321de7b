//! Aggregate counts for dashboards.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SchoolCounts {
    pub total_siswa: i64,
    pub siswa_aktif: i64,
    pub siswa_lulus: i64,
    pub siswa_pindah: i64,
    pub siswa_keluar: i64,
    pub pending_validasi: i64,
    pub total_guru: i64,
    pub total_orang_tua: i64,
    pub total_kelas: i64,
    pub tasmi_menunggu: i64,
}

pub async fn school_counts(pool: &PgPool) -> Result<SchoolCounts, sqlx::Error> {
    sqlx::query_as::<_, SchoolCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM siswa WHERE status = 'approved') AS total_siswa,
            (SELECT COUNT(*) FROM siswa WHERE status = 'approved' AND status_siswa = 'AKTIF') AS siswa_aktif,
            (SELECT COUNT(*) FROM siswa WHERE status_siswa = 'LULUS') AS siswa_lulus,
            (SELECT COUNT(*) FROM siswa WHERE status_siswa = 'PINDAH') AS siswa_pindah,
            (SELECT COUNT(*) FROM siswa WHERE status_siswa = 'KELUAR') AS siswa_keluar,
            (SELECT COUNT(*) FROM siswa WHERE status = 'pending') AS pending_validasi,
            (SELECT COUNT(*) FROM guru) AS total_guru,
            (SELECT COUNT(*) FROM orang_tua) AS total_orang_tua,
            (SELECT COUNT(*) FROM kelas WHERE is_active) AS total_kelas,
            (SELECT COUNT(*) FROM tasmi WHERE status_pendaftaran = 'MENUNGGU') AS tasmi_menunggu
        "#,
    )
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GuruCounts {
    pub total_kelas: i64,
    pub total_siswa: i64,
    pub penilaian_bulan_ini: i64,
    pub tasmi_menunggu: i64,
    pub rata_rata_nilai: Option<f64>,
}

pub async fn guru_counts(pool: &PgPool, guru_id: Uuid, month_start: NaiveDate) -> Result<GuruCounts, sqlx::Error> {
    sqlx::query_as::<_, GuruCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM guru_kelas WHERE guru_id = $1 AND is_active) AS total_kelas,
            (SELECT COUNT(*) FROM siswa s
               JOIN guru_kelas gk ON gk.kelas_id = s.kelas_id
              WHERE gk.guru_id = $1 AND gk.is_active AND s.status = 'approved') AS total_siswa,
            (SELECT COUNT(*) FROM penilaian p
               JOIN hafalan h ON h.id = p.hafalan_id
              WHERE p.guru_id = $1 AND h.tanggal >= $2) AS penilaian_bulan_ini,
            (SELECT COUNT(*) FROM tasmi
              WHERE guru_pengampu_id = $1 AND status_pendaftaran = 'MENUNGGU') AS tasmi_menunggu,
            (SELECT AVG(nilai_akhir) FROM penilaian WHERE guru_id = $1) AS rata_rata_nilai
        "#,
    )
    .bind(guru_id)
    .bind(month_start)
    .fetch_one(pool)
    .await
}
