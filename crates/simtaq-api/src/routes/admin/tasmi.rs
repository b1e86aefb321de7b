//! Tasmi' overview for administrators: period recap and the result list.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    models::{
        people::JenisKelamin,
        tasmi::{tasmi_recap, TasmiRecap, TasmiResult},
    },
};
use simtaq_db::repository::tasmi::{self, ResultFilter};
use std::sync::Arc;
use uuid::Uuid;

use super::non_blank;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/tasmi/rekap", get(rekap))
        .route("/admin/tasmi/results", get(results))
}

#[derive(Debug, Default, Deserialize)]
struct RekapQuery {
    tahun: Option<i32>,
    bulan: Option<u32>,
}

/// Registration-date window: the whole year, one month of it, or everything.
fn registration_window(q: &RekapQuery) -> SimtaqResult<(Option<NaiveDate>, Option<NaiveDate>)> {
    let invalid = || SimtaqError::validation("Parameter tahun/bulan tidak valid");
    match (q.tahun, q.bulan) {
        (None, None) => Ok((None, None)),
        (None, Some(_)) => Err(SimtaqError::validation("Parameter bulan memerlukan tahun")),
        (Some(tahun), None) => {
            let from = NaiveDate::from_ymd_opt(tahun, 1, 1).ok_or_else(invalid)?;
            let to = NaiveDate::from_ymd_opt(tahun, 12, 31).ok_or_else(invalid)?;
            Ok((Some(from), Some(to)))
        }
        (Some(tahun), Some(bulan)) => {
            let from = NaiveDate::from_ymd_opt(tahun, bulan, 1).ok_or_else(invalid)?;
            let next = if bulan == 12 {
                NaiveDate::from_ymd_opt(tahun + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(tahun, bulan + 1, 1)
            };
            let to = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
            Ok((Some(from), Some(to)))
        }
    }
}

/// GET /api/admin/tasmi/rekap?tahun=&bulan=
async fn rekap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RekapQuery>,
) -> SimtaqResult<Json<TasmiRecap>> {
    let (from, to) = registration_window(&query)?;
    let rows = tasmi::list_registered(&state.db.pg, from, to).await?;
    Ok(Json(tasmi_recap(rows)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultQuery {
    is_passed: Option<bool>,
    kelas_id: Option<Uuid>,
    q: Option<String>,
    tahun: Option<i32>,
    jenis_kelamin: Option<JenisKelamin>,
}

/// GET /api/admin/tasmi/results?isPassed=&kelasId=&q=&tahun=&jenisKelamin=
async fn results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResultQuery>,
) -> SimtaqResult<Json<Vec<TasmiResult>>> {
    let filter = ResultFilter {
        is_passed: query.is_passed,
        kelas_id: query.kelas_id,
        search: non_blank(&query.q),
        tahun: query.tahun,
        jenis_kelamin: query.jenis_kelamin,
        ids: None,
    };
    Ok(Json(tasmi::list_results(&state.db.pg, &filter).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn windows_by_year_and_month() {
        let q = |tahun, bulan| RekapQuery { tahun, bulan };
        assert_eq!(registration_window(&q(None, None)).unwrap(), (None, None));
        assert_eq!(
            registration_window(&q(Some(2025), None)).unwrap(),
            (Some(date(2025, 1, 1)), Some(date(2025, 12, 31)))
        );
        assert_eq!(
            registration_window(&q(Some(2024), Some(2))).unwrap(),
            (Some(date(2024, 2, 1)), Some(date(2024, 2, 29)))
        );
        assert_eq!(
            registration_window(&q(Some(2025), Some(12))).unwrap(),
            (Some(date(2025, 12, 1)), Some(date(2025, 12, 31)))
        );
        assert!(registration_window(&q(Some(2025), Some(13))).is_err());
        assert!(registration_window(&q(None, Some(3))).is_err());
    }
}
