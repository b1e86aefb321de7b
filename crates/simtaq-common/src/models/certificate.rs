//! Certificate templates, signers, award recipients and issued certificates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificateTemplate {
    pub id: Uuid,
    pub nama: String,
    pub filename: String,
    /// Public path, e.g. `/uploads/templates/template_<id>.png`.
    pub file_path: String,
    pub width: i32,
    pub height: i32,
    pub is_active: bool,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerPosition {
    Kiri,
    Kanan,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigner {
    pub id: Uuid,
    pub posisi: SignerPosition,
    pub jabatan: String,
    pub nama: String,
    pub nip: Option<String>,
    /// Public path of the signature image.
    pub ttd_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignerRequest {
    pub posisi: SignerPosition,
    #[validate(length(min = 1, max = 128, message = "Jabatan wajib diisi"))]
    pub jabatan: String,
    #[validate(length(min = 1, max = 128, message = "Nama penandatangan wajib diisi"))]
    pub nama: String,
    pub nip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecipient {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub event_name: String,
    pub event_date: NaiveDate,
    /// Award category, e.g. "Wisudawan Terbaik".
    pub kategori: String,
    pub capaian: Option<String>,
    pub source_tasmi_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecipientDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub recipient: AwardRecipient,
    pub siswa_nama: String,
    pub siswa_nis: String,
    pub kelas_nama: Option<String>,
    pub certificate_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecipientRequest {
    pub siswa_id: Uuid,
    #[validate(length(min = 1, max = 128, message = "Nama acara wajib diisi"))]
    pub event_name: String,
    pub event_date: NaiveDate,
    #[validate(length(min = 1, max = 128, message = "Kategori wajib diisi"))]
    pub kategori: String,
    pub capaian: Option<String>,
    pub source_tasmi_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateKind {
    Tasmi,
    Award,
}

impl CertificateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateKind::Tasmi => "TASMI",
            CertificateKind::Award => "AWARD",
        }
    }
}

/// An issued certificate. The PDF itself is rendered on demand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub kind: CertificateKind,
    pub certificate_number: String,
    pub siswa_id: Uuid,
    pub tasmi_id: Option<Uuid>,
    pub award_recipient_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub generated_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// `CERT/<KIND>/<YYYYMMDD>/<seq:04>`, where `seq` counts certificates of that kind issued on the day.
pub fn certificate_number(kind: CertificateKind, date: NaiveDate, seq: i64) -> String {
    format!("CERT/{}/{}/{:04}", kind.as_str(), date.format("%Y%m%d"), seq)
}

/// Prefix shared by all numbers of one kind on one day.
pub fn certificate_number_prefix(kind: CertificateKind, date: NaiveDate) -> String {
    format!("CERT/{}/{}/", kind.as_str(), date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(
            certificate_number(CertificateKind::Tasmi, date, 7),
            "CERT/TASMI/20250603/0007"
        );
        assert!(certificate_number(CertificateKind::Award, date, 12)
            .starts_with(&certificate_number_prefix(CertificateKind::Award, date)));
    }
}
