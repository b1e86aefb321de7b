//! Memorization deposits (hafalan) and their grades (penilaian).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// An additional surah range recited in the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurahTambahan {
    pub surah: String,
    #[serde(default)]
    pub surah_number: Option<i32>,
    pub ayat_mulai: i32,
    pub ayat_selesai: i32,
}

impl SurahTambahan {
    /// Drop blank names and inverted or non-positive ranges; trims names.
    pub fn sanitize(items: Vec<SurahTambahan>) -> Vec<SurahTambahan> {
        items
            .into_iter()
            .filter(|item| {
                !item.surah.trim().is_empty()
                    && item.ayat_mulai > 0
                    && item.ayat_selesai > 0
                    && item.ayat_mulai <= item.ayat_selesai
            })
            .map(|item| SurahTambahan {
                surah: item.surah.trim().to_string(),
                ..item
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Hafalan {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub guru_id: Uuid,
    pub tanggal: NaiveDate,
    pub juz: i32,
    pub surah: String,
    pub surah_number: Option<i32>,
    pub ayat_mulai: i32,
    pub ayat_selesai: i32,
    pub surah_tambahan: Json<Vec<SurahTambahan>>,
    pub keterangan: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Penilaian {
    pub id: Uuid,
    pub hafalan_id: Uuid,
    pub siswa_id: Uuid,
    pub guru_id: Uuid,
    pub tajwid: f64,
    pub kelancaran: f64,
    pub makhraj: f64,
    pub adab: f64,
    pub nilai_akhir: f64,
    pub catatan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grade joined with its hafalan and the student/teacher names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PenilaianDetail {
    pub id: Uuid,
    pub hafalan_id: Uuid,
    pub siswa_id: Uuid,
    pub siswa_nama: String,
    pub guru_id: Uuid,
    pub guru_nama: String,
    pub tanggal: NaiveDate,
    pub juz: i32,
    pub surah: String,
    pub ayat_mulai: i32,
    pub ayat_selesai: i32,
    pub surah_tambahan: Json<Vec<SurahTambahan>>,
    pub tajwid: f64,
    pub kelancaran: f64,
    pub makhraj: f64,
    pub adab: f64,
    pub nilai_akhir: f64,
    pub catatan: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenilaianRequest {
    pub siswa_id: Option<Uuid>,
    pub tanggal: Option<NaiveDate>,
    pub juz: Option<i32>,
    pub surah: Option<String>,
    pub ayat_mulai: Option<i32>,
    pub ayat_selesai: Option<i32>,
    #[serde(default)]
    pub surah_tambahan: Vec<SurahTambahan>,
    pub keterangan: Option<String>,
    pub tajwid: Option<f64>,
    pub kelancaran: Option<f64>,
    pub makhraj: Option<f64>,
    pub adab: Option<f64>,
    pub catatan: Option<String>,
}

/// Final grade: plain mean of the component scores, rounded to two decimals.
pub fn nilai_akhir(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nilai_akhir_is_rounded_mean() {
        assert_eq!(nilai_akhir(&[80.0, 85.0, 90.0, 95.0]), 87.5);
        assert_eq!(nilai_akhir(&[90.0, 85.0, 77.0]), 84.0);
        assert_eq!(nilai_akhir(&[100.0, 99.0, 99.0]), 99.33);
        assert_eq!(nilai_akhir(&[]), 0.0);
    }

    #[test]
    fn sanitize_drops_invalid_ranges() {
        let items = vec![
            SurahTambahan {
                surah: " An-Naba ".into(),
                surah_number: None,
                ayat_mulai: 1,
                ayat_selesai: 10,
            },
            SurahTambahan {
                surah: "".into(),
                surah_number: None,
                ayat_mulai: 1,
                ayat_selesai: 2,
            },
            SurahTambahan {
                surah: "Al-Mulk".into(),
                surah_number: Some(67),
                ayat_mulai: 10,
                ayat_selesai: 2,
            },
        ];
        let clean = SurahTambahan::sanitize(items);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].surah, "An-Naba");
    }
}
