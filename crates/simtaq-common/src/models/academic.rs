//! School years and classes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A school year (tahun ajaran). At most one is active.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TahunAjaran {
    pub id: Uuid,
    /// e.g. "2025/2026"
    pub nama: String,
    /// 1 = ganjil, 2 = genap
    pub semester: i32,
    pub tanggal_mulai: NaiveDate,
    pub tanggal_selesai: NaiveDate,
    /// Minimum fully memorised juz required to register for tasmi'.
    pub target_hafalan: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TahunAjaranRequest {
    #[validate(length(min = 4, max = 32, message = "Nama tahun ajaran wajib diisi"))]
    pub nama: String,
    #[validate(range(min = 1, max = 2, message = "Semester harus 1 atau 2"))]
    pub semester: i32,
    pub tanggal_mulai: NaiveDate,
    pub tanggal_selesai: NaiveDate,
    #[validate(range(min = 1, max = 30, message = "Target hafalan harus 1-30 juz"))]
    pub target_hafalan: Option<i32>,
}

/// A class of students within a school year.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Kelas {
    pub id: Uuid,
    pub nama: String,
    pub tahun_ajaran_id: Option<Uuid>,
    pub target_juz: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Class with aggregate counts for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct KelasSummary {
    pub id: Uuid,
    pub nama: String,
    pub tahun_ajaran_id: Option<Uuid>,
    pub tahun_ajaran_nama: Option<String>,
    pub target_juz: Option<i32>,
    pub is_active: bool,
    pub jumlah_siswa: i64,
    pub guru_utama: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KelasRequest {
    #[validate(length(min = 1, max = 64, message = "Nama kelas wajib diisi"))]
    pub nama: String,
    pub tahun_ajaran_id: Option<Uuid>,
    #[validate(range(min = 1, max = 30, message = "Target juz harus 1-30"))]
    pub target_juz: Option<i32>,
}

/// Role of a teacher inside a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeranGuru {
    Utama,
    Pendamping,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GuruKelas {
    pub id: Uuid,
    pub guru_id: Uuid,
    pub kelas_id: Uuid,
    pub peran: PeranGuru,
    pub is_active: bool,
    pub guru_nama: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignGuruRequest {
    pub guru_id: Uuid,
    pub peran: Option<PeranGuru>,
}
