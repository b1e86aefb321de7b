//! Class reports for administrators: hafalan, kehadiran and the combined
//! rekap, each as JSON or a PDF download.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use simtaq_common::error::SimtaqResult;
use std::sync::Arc;

use crate::{
    report::ReportKind,
    routes::laporan::{class_recap, export, find_kelas, today, ReportQuery},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/laporan/{kind}", get(class_report))
}

/// GET /api/admin/laporan/{hafalan|kehadiran|rekap}?kelasId=&from=&to=&viewMode=&tanggal=&format=
async fn class_report(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<ReportKind>,
    Query(query): Query<ReportQuery>,
) -> SimtaqResult<Response> {
    let kelas_id = query.kelas_id()?;
    let (mode, periode) = query.resolve(today())?;

    let kelas = find_kelas(&state, kelas_id).await?;
    let recap = class_recap(&state, &kelas, mode, periode).await?;
    tracing::info!(kelas = %kelas.nama, ?kind, format = ?query.format, "Admin class report");
    export(kind, query.format, &kelas, recap).await
}
