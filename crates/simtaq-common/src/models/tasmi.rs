//! Tasmi' (oral recitation exam) registrations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::people::JenisKelamin;

/// Registration life cycle:
/// `MENUNGGU -> DISETUJUI -> SELESAI`, `MENUNGGU -> DITOLAK`, `MENUNGGU -> DIBATALKAN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TasmiStatus {
    Menunggu,
    Disetujui,
    Ditolak,
    Selesai,
    Dibatalkan,
}

impl TasmiStatus {
    /// Registrations that block a student from registering again.
    pub fn is_open(&self) -> bool {
        matches!(self, TasmiStatus::Menunggu | TasmiStatus::Disetujui)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tasmi {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub kelas_id: Option<Uuid>,
    pub guru_pengampu_id: Uuid,
    pub guru_verifikasi_id: Option<Uuid>,
    pub guru_penguji_id: Option<Uuid>,
    pub jumlah_hafalan: i32,
    pub juz_yang_ditasmi: String,
    pub jam_tasmi: String,
    pub tanggal_tasmi: NaiveDate,
    pub tanggal_ujian: Option<NaiveDate>,
    pub catatan: Option<String>,
    pub catatan_penolakan: Option<String>,
    pub status_pendaftaran: TasmiStatus,
    pub nilai_kelancaran: Option<f64>,
    pub nilai_tajwid: Option<f64>,
    pub nilai_adab: Option<f64>,
    pub nilai_irama: Option<f64>,
    pub nilai_akhir: Option<f64>,
    pub predikat: Option<String>,
    pub is_passed: Option<bool>,
    pub catatan_penguji: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tanggal_daftar: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration joined with the names shown in lists.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TasmiDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tasmi: Tasmi,
    pub siswa_nama: String,
    pub siswa_nis: String,
    pub kelas_nama: Option<String>,
    pub guru_pengampu_nama: String,
    pub guru_penguji_nama: Option<String>,
}

impl TasmiDetail {
    /// Strip exam results that the viewer must not see yet.
    pub fn hide_results(mut self) -> Self {
        let t = &mut self.tasmi;
        t.nilai_kelancaran = None;
        t.nilai_tajwid = None;
        t.nilai_adab = None;
        t.nilai_irama = None;
        t.nilai_akhir = None;
        t.predikat = None;
        t.is_passed = None;
        t.catatan_penguji = None;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaftarTasmiRequest {
    pub jumlah_hafalan: Option<i32>,
    pub juz_yang_ditasmi: Option<String>,
    pub guru_id: Option<Uuid>,
    pub jam_tasmi: Option<String>,
    pub tanggal_tasmi: Option<NaiveDate>,
    pub catatan: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTasmiRequest {
    pub tanggal_ujian: Option<NaiveDate>,
    pub catatan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectTasmiRequest {
    pub catatan_penolakan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeTasmiRequest {
    pub nilai_kelancaran: Option<f64>,
    pub nilai_tajwid: Option<f64>,
    pub nilai_adab: Option<f64>,
    pub nilai_irama: Option<f64>,
    pub nilai_akhir: Option<f64>,
    pub predikat: Option<String>,
    pub is_passed: Option<bool>,
    pub catatan_penguji: Option<String>,
    #[serde(default)]
    pub publish: bool,
}

/// A completed exam with the certificate issued for it, if any.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TasmiResult {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub detail: TasmiDetail,
    pub jenis_kelamin: Option<JenisKelamin>,
    pub certificate_id: Option<Uuid>,
    pub certificate_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub jumlah: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub menunggu: i64,
    pub disetujui: i64,
    pub ditolak: i64,
    pub selesai: i64,
    pub dibatalkan: i64,
}

/// School-wide tasmi' overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasmiRecap {
    pub total: i64,
    pub per_status: StatusCounts,
    pub lulus: i64,
    pub tidak_lulus: i64,
    pub rata_nilai: Option<f64>,
    pub per_predikat: Vec<LabelCount>,
    pub per_kelas: Vec<LabelCount>,
    /// Ten best published results by final score.
    pub terbaik: Vec<TasmiDetail>,
}

fn label_counts(counts: BTreeMap<String, i64>) -> Vec<LabelCount> {
    counts
        .into_iter()
        .map(|(label, jumlah)| LabelCount { label, jumlah })
        .collect()
}

pub fn tasmi_recap(rows: Vec<TasmiDetail>) -> TasmiRecap {
    let mut per_status = StatusCounts::default();
    let mut per_predikat = BTreeMap::new();
    let mut per_kelas = BTreeMap::new();
    let (mut lulus, mut tidak_lulus) = (0, 0);
    let (mut sum, mut graded) = (0.0, 0u32);

    for row in &rows {
        let t = &row.tasmi;
        match t.status_pendaftaran {
            TasmiStatus::Menunggu => per_status.menunggu += 1,
            TasmiStatus::Disetujui => per_status.disetujui += 1,
            TasmiStatus::Ditolak => per_status.ditolak += 1,
            TasmiStatus::Selesai => per_status.selesai += 1,
            TasmiStatus::Dibatalkan => per_status.dibatalkan += 1,
        }
        match t.is_passed {
            Some(true) => lulus += 1,
            Some(false) => tidak_lulus += 1,
            None => {}
        }
        if let Some(nilai) = t.nilai_akhir {
            sum += nilai;
            graded += 1;
        }
        if let Some(predikat) = t.predikat.as_deref().filter(|p| !p.is_empty()) {
            *per_predikat.entry(predikat.to_string()).or_insert(0) += 1;
        }
        let kelas = row.kelas_nama.clone().unwrap_or_else(|| "Tanpa kelas".to_string());
        *per_kelas.entry(kelas).or_insert(0) += 1;
    }

    let rata_nilai = (graded > 0).then(|| (sum / f64::from(graded) * 10.0).round() / 10.0);
    let total = rows.len() as i64;

    let mut terbaik: Vec<TasmiDetail> = rows
        .into_iter()
        .filter(|r| r.tasmi.published_at.is_some() && r.tasmi.nilai_akhir.is_some())
        .collect();
    terbaik.sort_by(|a, b| {
        let score = |r: &TasmiDetail| r.tasmi.nilai_akhir.unwrap_or_default();
        score(b).total_cmp(&score(a))
    });
    terbaik.truncate(10);

    TasmiRecap {
        total,
        per_status,
        lulus,
        tidak_lulus,
        rata_nilai,
        per_predikat: label_counts(per_predikat),
        per_kelas: label_counts(per_kelas),
        terbaik,
    }
}

/// Predicate for a final tasmi' score.
pub fn predikat_for(nilai_akhir: f64) -> &'static str {
    if nilai_akhir >= 90.0 {
        "Mumtaz"
    } else if nilai_akhir >= 80.0 {
        "Jayyid Jiddan"
    } else if nilai_akhir >= 70.0 {
        "Jayyid"
    } else {
        "Maqbul"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predikat_thresholds() {
        assert_eq!(predikat_for(95.0), "Mumtaz");
        assert_eq!(predikat_for(90.0), "Mumtaz");
        assert_eq!(predikat_for(89.99), "Jayyid Jiddan");
        assert_eq!(predikat_for(70.0), "Jayyid");
        assert_eq!(predikat_for(40.0), "Maqbul");
    }

    fn detail(status: TasmiStatus, nilai: Option<f64>, published: bool, kelas: Option<&str>) -> TasmiDetail {
        let now = Utc::now();
        TasmiDetail {
            tasmi: Tasmi {
                id: Uuid::new_v4(),
                siswa_id: Uuid::new_v4(),
                kelas_id: None,
                guru_pengampu_id: Uuid::new_v4(),
                guru_verifikasi_id: None,
                guru_penguji_id: None,
                jumlah_hafalan: 3,
                juz_yang_ditasmi: "28, 29, 30".into(),
                jam_tasmi: "08:00".into(),
                tanggal_tasmi: now.date_naive(),
                tanggal_ujian: None,
                catatan: None,
                catatan_penolakan: None,
                status_pendaftaran: status,
                nilai_kelancaran: nilai,
                nilai_tajwid: nilai,
                nilai_adab: nilai,
                nilai_irama: nilai,
                nilai_akhir: nilai,
                predikat: nilai.map(|n| predikat_for(n).to_string()),
                is_passed: nilai.map(|n| n >= 70.0),
                catatan_penguji: None,
                published_at: published.then_some(now),
                tanggal_daftar: now,
                updated_at: now,
            },
            siswa_nama: "Siswa".into(),
            siswa_nis: "0001".into(),
            kelas_nama: kelas.map(str::to_string),
            guru_pengampu_nama: "Guru".into(),
            guru_penguji_nama: None,
        }
    }

    #[test]
    fn recap_breakdown() {
        let mut rows = vec![
            detail(TasmiStatus::Menunggu, None, false, Some("XII A")),
            detail(TasmiStatus::Selesai, Some(95.0), true, Some("XII A")),
            detail(TasmiStatus::Selesai, Some(60.0), true, Some("XII B")),
            detail(TasmiStatus::Selesai, Some(82.0), false, None),
        ];
        rows.extend((0..10).map(|i| detail(TasmiStatus::Selesai, Some(70.0 + f64::from(i)), true, Some("XII B"))));

        let recap = tasmi_recap(rows);
        assert_eq!(recap.total, 14);
        assert_eq!(recap.per_status.menunggu, 1);
        assert_eq!(recap.per_status.selesai, 13);
        assert_eq!((recap.lulus, recap.tidak_lulus), (12, 1));
        assert_eq!(
            recap.per_kelas,
            vec![
                LabelCount { label: "Tanpa kelas".into(), jumlah: 1 },
                LabelCount { label: "XII A".into(), jumlah: 2 },
                LabelCount { label: "XII B".into(), jumlah: 11 },
            ]
        );
        assert!(recap.per_predikat.iter().any(|p| p.label == "Mumtaz" && p.jumlah == 1));

        assert_eq!(recap.terbaik.len(), 10);
        assert_eq!(recap.terbaik[0].tasmi.nilai_akhir, Some(95.0));
        // unpublished 82 is not ranked
        assert!(recap.terbaik.iter().all(|t| t.tasmi.published_at.is_some()));
        assert!(recap.terbaik.iter().all(|t| t.tasmi.nilai_akhir != Some(60.0)));
    }

    #[test]
    fn recap_of_nothing() {
        let recap = tasmi_recap(Vec::new());
        assert_eq!(recap.total, 0);
        assert_eq!(recap.rata_nilai, None);
        assert!(recap.terbaik.is_empty());
    }

    #[test]
    fn open_statuses() {
        assert!(TasmiStatus::Menunggu.is_open());
        assert!(TasmiStatus::Disetujui.is_open());
        assert!(!TasmiStatus::Selesai.is_open());
        assert!(!TasmiStatus::Dibatalkan.is_open());
    }
}
