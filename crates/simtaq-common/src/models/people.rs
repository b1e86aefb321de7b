//! Teacher, student and parent profiles. Each is linked 1:1 to a [`User`](super::user::User).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JenisKelamin {
    LakiLaki,
    Perempuan,
}

/// Life-cycle status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSiswa {
    Aktif,
    Lulus,
    Pindah,
    Keluar,
}

impl StatusSiswa {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSiswa::Aktif => "AKTIF",
            StatusSiswa::Lulus => "LULUS",
            StatusSiswa::Pindah => "PINDAH",
            StatusSiswa::Keluar => "KELUAR",
        }
    }
}

/// Admin validation state of a newly registered student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Guru {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nip: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub no_telepon: Option<String>,
    pub alamat: Option<String>,
    /// Public path of the uploaded signature image.
    pub ttd_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Teacher joined with the account fields shown in listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GuruDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub nip: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub no_telepon: Option<String>,
    pub alamat: Option<String>,
    pub ttd_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuruRequest {
    #[validate(length(min = 2, max = 128, message = "Nama guru wajib diisi"))]
    pub name: String,
    #[validate(email(message = "Format email tidak valid"))]
    pub email: Option<String>,
    pub nip: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub no_telepon: Option<String>,
    pub alamat: Option<String>,
    /// Overrides the generated default password.
    #[validate(length(min = 8, max = 128, message = "Password minimal 8 karakter"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Siswa {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nis: String,
    pub nisn: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub alamat: Option<String>,
    pub no_telepon: Option<String>,
    pub kelas_id: Option<Uuid>,
    pub status: ValidationStatus,
    pub status_siswa: StatusSiswa,
    pub tanggal_keluar: Option<DateTime<Utc>>,
    pub latest_juz_achieved: i32,
    pub created_at: DateTime<Utc>,
}

/// Student joined with account and class fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SiswaDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub nis: String,
    pub nisn: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub alamat: Option<String>,
    pub no_telepon: Option<String>,
    pub kelas_id: Option<Uuid>,
    pub kelas_nama: Option<String>,
    pub status: ValidationStatus,
    pub status_siswa: StatusSiswa,
    pub tanggal_keluar: Option<DateTime<Utc>>,
    pub latest_juz_achieved: i32,
    pub created_at: DateTime<Utc>,
}

/// Parent data captured together with a new student.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WaliInput {
    #[validate(length(min = 2, max = 128, message = "Nama wali wajib diisi"))]
    pub name: String,
    pub no_telepon: Option<String>,
    pub pekerjaan: Option<String>,
    pub alamat: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    /// e.g. "Ayah", "Ibu", "Wali"
    pub hubungan: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiswaRequest {
    #[validate(length(min = 2, max = 128, message = "Nama siswa wajib diisi"))]
    pub name: String,
    #[validate(length(min = 4, max = 20, message = "NIS wajib diisi"))]
    pub nis: String,
    pub nisn: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: NaiveDate,
    pub alamat: Option<String>,
    pub no_telepon: Option<String>,
    pub kelas_id: Option<Uuid>,
    #[validate(email(message = "Format email tidak valid"))]
    pub email: Option<String>,
    #[validate(nested)]
    pub wali: Option<WaliInput>,
    /// Link to an existing parent instead of creating one.
    pub orang_tua_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiswaRequest {
    #[validate(length(min = 2, max = 128, message = "Nama siswa tidak valid"))]
    pub name: Option<String>,
    pub nisn: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub alamat: Option<String>,
    pub no_telepon: Option<String>,
    #[validate(email(message = "Format email tidak valid"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrangTua {
    pub id: Uuid,
    pub user_id: Uuid,
    pub no_telepon: Option<String>,
    pub pekerjaan: Option<String>,
    pub alamat: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrangTuaDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub no_telepon: Option<String>,
    pub pekerjaan: Option<String>,
    pub alamat: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
}

/// A child as seen from the parent link table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LinkedChild {
    pub orang_tua_id: Uuid,
    pub siswa_id: Uuid,
    pub name: String,
    pub nis: String,
    pub nisn: Option<String>,
    pub kelas_nama: Option<String>,
    pub status_siswa: StatusSiswa,
    pub hubungan: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrangTuaRequest {
    #[validate(length(min = 2, max = 128, message = "Nama orang tua wajib diisi"))]
    pub name: String,
    #[validate(email(message = "Format email tidak valid"))]
    pub email: Option<String>,
    pub no_telepon: Option<String>,
    pub pekerjaan: Option<String>,
    pub alamat: Option<String>,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub is_active: Option<bool>,
    /// Used only when no child is linked; otherwise the child's NIS is the username.
    pub username: Option<String>,
    /// Child linked on creation.
    pub siswa_id: Option<Uuid>,
    pub hubungan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSiswaRequest {
    pub siswa_id: Uuid,
    pub hubungan: Option<String>,
}
