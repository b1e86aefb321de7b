//! Attendance records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresensiStatus {
    Hadir,
    Izin,
    Sakit,
    Alfa,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Presensi {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub guru_id: Option<Uuid>,
    pub tanggal: NaiveDate,
    pub status: PresensiStatus,
    pub keterangan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One roster line: every approved student of a class with their attendance (if any) on a date.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PresensiRosterRow {
    pub siswa_id: Uuid,
    pub name: String,
    pub nis: String,
    pub presensi_id: Option<Uuid>,
    pub status: Option<PresensiStatus>,
    pub keterangan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresensiItem {
    pub siswa_id: Uuid,
    pub status: PresensiStatus,
    pub keterangan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPresensiRequest {
    pub kelas_id: Option<Uuid>,
    pub tanggal: Option<NaiveDate>,
    #[serde(default)]
    pub presensi: Vec<PresensiItem>,
}

/// Attendance counts per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresensiSummary {
    pub hadir: i64,
    pub izin: i64,
    pub sakit: i64,
    pub alfa: i64,
    pub total: i64,
    /// Share of HADIR in percent, one decimal.
    pub persentase_hadir: f64,
}

impl PresensiSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = PresensiStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status {
                PresensiStatus::Hadir => summary.hadir += 1,
                PresensiStatus::Izin => summary.izin += 1,
                PresensiStatus::Sakit => summary.sakit += 1,
                PresensiStatus::Alfa => summary.alfa += 1,
            }
            summary.total += 1;
        }
        if summary.total > 0 {
            let pct = summary.hadir as f64 / summary.total as f64 * 100.0;
            summary.persentase_hadir = (pct * 10.0).round() / 10.0;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_and_percentage() {
        use PresensiStatus::*;
        let s = PresensiSummary::from_statuses([Hadir, Hadir, Izin, Alfa, Hadir, Sakit]);
        assert_eq!((s.hadir, s.izin, s.sakit, s.alfa, s.total), (3, 1, 1, 1, 6));
        assert_eq!(s.persentase_hadir, 50.0);
        assert_eq!(PresensiSummary::from_statuses([]).persentase_hadir, 0.0);
    }
}
