//! Class report loading shared by the admin and guru areas.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use simtaq_common::{
    config,
    error::{SimtaqError, SimtaqResult},
    models::{
        academic::Kelas,
        laporan::{build_class_recap, semester_key, ClassRecap, PeriodeShortcut, RecapInput, ReportPeriod, ViewMode},
    },
};
use simtaq_db::repository::{kelas, laporan, tahun_ajaran};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    certificate::render_blocking,
    report::{self, ExportFormat, ReportKind},
    AppState,
};

/// `?kelasId=&from=&to=&viewMode=&tanggal=&periode=&format=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportQuery {
    pub kelas_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub view_mode: Option<ViewMode>,
    pub tanggal: Option<NaiveDate>,
    pub periode: Option<PeriodeShortcut>,
    #[serde(default)]
    pub format: ExportFormat,
}

impl ReportQuery {
    pub fn kelas_id(&self) -> SimtaqResult<Uuid> {
        self.kelas_id.ok_or_else(|| SimtaqError::validation("kelasId wajib diisi"))
    }

    /// Explicit range first, then the shortcut, then the view mode around `tanggal`.
    pub fn resolve(&self, today: NaiveDate) -> SimtaqResult<(ViewMode, ReportPeriod)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                let periode = ReportPeriod::new(from, to)?;
                let mode = self.view_mode.unwrap_or(if from == to { ViewMode::Harian } else { ViewMode::Bulanan });
                return Ok((mode, periode));
            }
            (None, None) => {}
            _ => return Err(SimtaqError::validation("Parameter from dan to harus diisi bersamaan")),
        }

        if let Some(shortcut) = self.periode {
            let mode = match shortcut {
                PeriodeShortcut::BulanIni | PeriodeShortcut::BulanLalu => ViewMode::Bulanan,
                PeriodeShortcut::SemesterIni => ViewMode::Semesteran,
            };
            return Ok((mode, ReportPeriod::from_shortcut(shortcut, today)));
        }

        let mode = self.view_mode.unwrap_or_default();
        Ok((mode, ReportPeriod::for_view(mode, self.tanggal.unwrap_or(today))))
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) async fn find_kelas(state: &AppState, id: Uuid) -> SimtaqResult<Kelas> {
    kelas::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Kelas"))
}

/// Class target, else the active school year's, else the configured default.
async fn target_juz(state: &AppState, kelas: &Kelas) -> SimtaqResult<i32> {
    if let Some(target) = kelas.target_juz {
        return Ok(target);
    }
    let year_target = tahun_ajaran::find_active(&state.db.pg)
        .await?
        .and_then(|t| t.target_hafalan);
    Ok(year_target.unwrap_or(config::get().school.default_target_juz))
}

/// Recap of the class over `periode`. The semester view carries the semester notes.
pub(crate) async fn class_recap(
    state: &AppState,
    kelas: &Kelas,
    mode: ViewMode,
    periode: ReportPeriod,
) -> SimtaqResult<ClassRecap> {
    let pool = &state.db.pg;
    let roster = laporan::roster(pool, kelas.id).await?;
    let attendance = laporan::attendance(pool, kelas.id, periode.from, periode.to).await?;
    let deposits = laporan::graded_deposits(pool, kelas.id, periode.from, periode.to).await?;

    let mut recap = build_class_recap(
        periode,
        RecapInput {
            roster: &roster,
            attendance: &attendance,
            deposits: &deposits,
            target_juz: target_juz(state, kelas).await?,
            scores_require_presence: mode == ViewMode::Harian,
        },
    );

    if mode == ViewMode::Semesteran {
        let notes: HashMap<Uuid, String> = laporan::catatan_for_kelas(pool, kelas.id, &semester_key(periode.from))
            .await?
            .into_iter()
            .map(|c| (c.siswa_id, c.catatan))
            .collect();
        for siswa in &mut recap.siswa {
            siswa.catatan_semester = notes.get(&siswa.siswa_id).cloned();
        }
    }

    tracing::debug!(
        kelas_id = %kelas.id,
        ?mode,
        from = %periode.from,
        to = %periode.to,
        siswa = recap.siswa.len(),
        "Class recap built"
    );
    Ok(recap)
}

/// Recap as JSON, a PDF download or a CSV download.
pub(crate) async fn export(
    kind: ReportKind,
    format: ExportFormat,
    kelas: &Kelas,
    recap: ClassRecap,
) -> SimtaqResult<Response> {
    match format {
        ExportFormat::Json => Ok(Json(recap).into_response()),
        ExportFormat::Pdf => {
            let filename = report::report_filename(kind, &kelas.nama, recap.periode, "pdf");
            let doc = report::class_report(kind, &kelas.nama, &recap, &config::get().school, today());
            let bytes = render_blocking(move || report::render(&doc)).await?;
            Ok(report::pdf_attachment(bytes, &filename))
        }
        ExportFormat::Csv => {
            let filename = report::report_filename(kind, &kelas.nama, recap.periode, "csv");
            let bytes = report::to_csv(&report::recap_table(kind, &recap)).map_err(SimtaqError::Internal)?;
            Ok(report::csv_attachment(bytes, &filename))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query(raw: &str) -> ReportQuery {
        let uri: axum::http::Uri = format!("/laporan?{raw}").parse().unwrap();
        axum::extract::Query::<ReportQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn explicit_range_wins() {
        let (mode, periode) = query("from=2025-03-01&to=2025-03-31&periode=bulan-lalu")
            .resolve(date(2025, 6, 10))
            .unwrap();
        assert_eq!(mode, ViewMode::Bulanan);
        assert_eq!((periode.from, periode.to), (date(2025, 3, 1), date(2025, 3, 31)));

        let (mode, _) = query("from=2025-03-05&to=2025-03-05").resolve(date(2025, 6, 10)).unwrap();
        assert_eq!(mode, ViewMode::Harian);
    }

    #[test]
    fn reversed_or_half_ranges_are_rejected() {
        assert!(query("from=2025-03-31&to=2025-03-01").resolve(date(2025, 6, 10)).is_err());
        assert!(query("from=2025-03-01").resolve(date(2025, 6, 10)).is_err());
    }

    #[test]
    fn shortcuts_and_view_modes() {
        let today = date(2025, 6, 10);
        let (mode, periode) = query("periode=bulan-lalu").resolve(today).unwrap();
        assert_eq!(mode, ViewMode::Bulanan);
        assert_eq!((periode.from, periode.to), (date(2025, 5, 1), date(2025, 5, 31)));

        let (mode, periode) = query("periode=semester-ini").resolve(today).unwrap();
        assert_eq!(mode, ViewMode::Semesteran);
        assert_eq!((periode.from, periode.to), (date(2025, 1, 1), date(2025, 6, 30)));

        let (mode, periode) = query("viewMode=harian&tanggal=2025-02-03").resolve(today).unwrap();
        assert_eq!(mode, ViewMode::Harian);
        assert_eq!((periode.from, periode.to), (date(2025, 2, 3), date(2025, 2, 3)));

        let (mode, periode) = query("").resolve(today).unwrap();
        assert_eq!(mode, ViewMode::Bulanan);
        assert_eq!((periode.from, periode.to), (date(2025, 6, 1), date(2025, 6, 30)));
    }

    #[test]
    fn format_and_class_parameters() {
        let q = query("kelasId=00000000-0000-0000-0000-000000000001&format=csv");
        assert_eq!(q.format, ExportFormat::Csv);
        assert!(q.kelas_id().is_ok());
        assert_eq!(query("").format, ExportFormat::Json);
        assert!(query("").kelas_id().is_err());
    }
}
