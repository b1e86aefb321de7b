//! Admin dashboard aggregates, cached for `cache.ttl_secs`.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use simtaq_common::{error::SimtaqResult, models::presensi::PresensiSummary};
use simtaq_db::repository::{
    activity_logs::{self, ActivityFilter},
    hafalan, presensi,
    stats::{self, SchoolCounts},
};
use std::sync::Arc;

use crate::{cache, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/dashboard", get(dashboard))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminDashboard {
    #[serde(flatten)]
    counts: SchoolCounts,
    hafalan_bulan_ini: i64,
    presensi_bulan_ini: PresensiSummary,
    aktivitas_terbaru: Vec<simtaq_common::models::activity::ActivityLog>,
}

fn month_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

/// GET /api/admin/dashboard
async fn dashboard(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<serde_json::Value>> {
    if let Some(cached) = state.cache.get(cache::ADMIN_STATS) {
        return Ok(Json(cached));
    }

    let today = Utc::now().date_naive();
    let since = month_start(today);
    let recent = ActivityFilter::default();

    let (counts, hafalan_bulan_ini, statuses, aktivitas_terbaru) = tokio::try_join!(
        stats::school_counts(&state.db.pg),
        hafalan::count_since(&state.db.pg, since),
        presensi::statuses_between(&state.db.pg, since, today),
        activity_logs::list(&state.db.pg, &recent, 10, 0),
    )?;

    let body = serde_json::to_value(AdminDashboard {
        counts,
        hafalan_bulan_ini,
        presensi_bulan_ini: PresensiSummary::from_statuses(statuses),
        aktivitas_terbaru,
    })
    .map_err(anyhow::Error::from)?;

    state.cache.set(cache::ADMIN_STATS, body.clone());
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_starts_on_the_first() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}
