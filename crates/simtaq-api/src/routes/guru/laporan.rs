//! Class report for the guru's own classes, plus semester notes.

use axum::{
    extract::{Query, State},
    response::Response,
    routing::{get, put},
    Extension, Json, Router,
};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::laporan::{semester_key, CatatanSemester, CatatanSemesterRequest},
    validation::validate_request,
};
use simtaq_db::repository::{laporan, siswa};
use std::sync::Arc;

use super::{current_guru, ensure_teaches};
use crate::{
    middleware::AuthContext,
    report::ReportKind,
    routes::laporan::{class_recap, export, find_kelas, today, ReportQuery},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guru/laporan", get(class_report))
        .route("/guru/laporan/catatan-semester", put(save_catatan))
}

/// GET /api/guru/laporan?kelasId=&viewMode=&tanggal=&periode=&from=&to=&format=json|pdf|csv
async fn class_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ReportQuery>,
) -> SimtaqResult<Response> {
    let kelas_id = query.kelas_id()?;
    let (mode, periode) = query.resolve(today())?;

    let me = current_guru(&state, &ctx).await?;
    ensure_teaches(&state, me.id, Some(kelas_id)).await?;
    let kelas = find_kelas(&state, kelas_id).await?;

    let recap = class_recap(&state, &kelas, mode, periode).await?;
    export(ReportKind::Rekap, query.format, &kelas, recap).await
}

/// PUT /api/guru/laporan/catatan-semester
///
/// One note per student and semester; saving again replaces it.
async fn save_catatan(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<CatatanSemesterRequest>,
) -> SimtaqResult<Json<CatatanSemester>> {
    validate_request(&body)?;
    let catatan = body.catatan.trim();
    if catatan.is_empty() {
        return Err(SimtaqError::validation("Catatan wajib diisi (maksimal 2000 karakter)"));
    }

    let me = current_guru(&state, &ctx).await?;
    let student = siswa::find_by_id(&state.db.pg, body.siswa_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    ensure_teaches(&state, me.id, student.kelas_id).await?;

    let semester = semester_key(body.tanggal.unwrap_or_else(today));
    let saved = laporan::upsert_catatan(&state.db.pg, generate_id(), student.id, me.id, &semester, catatan).await?;
    tracing::info!(siswa_id = %student.id, guru_id = %me.id, %semester, "Semester note saved");
    Ok(Json(saved))
}
