//! Student area: own profile, memorization history and progress, attendance,
//! grades, and tasmi' registration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{get, patch},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use simtaq_common::{
    config,
    error::{on_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        hafalan::{Hafalan, PenilaianDetail},
        pengumuman::PushPayload,
        people::{GuruDetail, Siswa, SiswaDetail},
        presensi::{Presensi, PresensiSummary},
        tasmi::{DaftarTasmiRequest, Tasmi, TasmiDetail, TasmiStatus},
    },
    quran::{calculate_juz_progress, dashboard_juz_progress, ranges_of, tasmi_eligibility, JuzProgress, ProgressSummary, TasmiEligibility},
    status::{can_perform, SiswaAction},
    validation::require_fields,
};
use simtaq_db::repository::{guru, hafalan, presensi, siswa, tahun_ajaran, tasmi};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    activity,
    middleware::{auth_middleware, require_siswa, AuthContext, ClientInfo},
    push::Audience,
    AppState,
};

const DASHBOARD_JUZ: usize = 5;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/siswa/profile", get(profile))
        .route("/siswa/hafalan", get(list_hafalan))
        .route("/siswa/progress", get(progress))
        .route("/siswa/presensi", get(list_presensi))
        .route("/siswa/penilaian", get(list_penilaian))
        .route("/siswa/guru", get(list_guru))
        .route("/siswa/tasmi", get(list_tasmi).post(daftar_tasmi))
        .route("/siswa/tasmi/{id}/cancel", patch(cancel_tasmi))
        .route_layer(from_fn(require_siswa))
        .route_layer(from_fn(auth_middleware))
}

async fn current_siswa(state: &AppState, ctx: &AuthContext) -> SimtaqResult<Siswa> {
    siswa::find_by_user_id(&state.db.pg, ctx.user_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Data siswa"))
}

/// Juz coverage with the eligibility verdict against the active school year.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressView {
    #[serde(flatten)]
    pub summary: ProgressSummary,
    pub dashboard: Vec<JuzProgress>,
    pub eligibility: TasmiEligibility,
}

/// Target juz of the active school year, or the configured default.
pub(crate) async fn target_juz(state: &AppState) -> SimtaqResult<i32> {
    let active = tahun_ajaran::find_active(&state.db.pg).await?;
    Ok(active
        .and_then(|year| year.target_hafalan)
        .unwrap_or(config::get().school.default_target_juz))
}

pub(crate) async fn progress_view(state: &AppState, siswa_id: Uuid) -> SimtaqResult<ProgressView> {
    let deposits = hafalan::list_for_siswa(&state.db.pg, siswa_id).await?;
    let ranges: Vec<_> = deposits.iter().flat_map(ranges_of).collect();
    let summary = calculate_juz_progress(&ranges);
    let eligibility = tasmi_eligibility(summary.completed_juz_count, target_juz(state).await?);
    Ok(ProgressView {
        dashboard: dashboard_juz_progress(&summary.juz_progress, DASHBOARD_JUZ),
        summary,
        eligibility,
    })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize)]
pub(crate) struct PresensiView {
    pub presensi: Vec<Presensi>,
    pub summary: PresensiSummary,
}

pub(crate) async fn presensi_view(state: &AppState, siswa_id: Uuid, range: &RangeQuery) -> SimtaqResult<PresensiView> {
    let rows = presensi::list_for_siswa(&state.db.pg, siswa_id, range.from, range.to).await?;
    let summary = PresensiSummary::from_statuses(rows.iter().map(|p| p.status));
    Ok(PresensiView { presensi: rows, summary })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PenilaianView {
    pub penilaian: Vec<PenilaianDetail>,
    pub rata_rata: Option<f64>,
}

pub(crate) async fn penilaian_view(state: &AppState, siswa_id: Uuid) -> SimtaqResult<PenilaianView> {
    let (penilaian, rata_rata) = tokio::try_join!(
        hafalan::list_penilaian_for_siswa(&state.db.pg, siswa_id),
        hafalan::average_for_siswa(&state.db.pg, siswa_id),
    )?;
    Ok(PenilaianView {
        penilaian,
        rata_rata: rata_rata.map(|avg| (avg * 100.0).round() / 100.0),
    })
}

/// GET /api/siswa/profile
async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<SiswaDetail>> {
    let me = current_siswa(&state, &ctx).await?;
    let detail = siswa::find_detail(&state.db.pg, me.id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Data siswa"))?;
    Ok(Json(detail))
}

/// GET /api/siswa/hafalan
async fn list_hafalan(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<Vec<Hafalan>>> {
    let me = current_siswa(&state, &ctx).await?;
    Ok(Json(hafalan::list_for_siswa(&state.db.pg, me.id).await?))
}

/// GET /api/siswa/progress
async fn progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<ProgressView>> {
    let me = current_siswa(&state, &ctx).await?;
    Ok(Json(progress_view(&state, me.id).await?))
}

/// GET /api/siswa/presensi?from=&to=
async fn list_presensi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(range): Query<RangeQuery>,
) -> SimtaqResult<Json<PresensiView>> {
    let me = current_siswa(&state, &ctx).await?;
    Ok(Json(presensi_view(&state, me.id, &range).await?))
}

/// GET /api/siswa/penilaian
async fn list_penilaian(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<PenilaianView>> {
    let me = current_siswa(&state, &ctx).await?;
    Ok(Json(penilaian_view(&state, me.id).await?))
}

/// GET /api/siswa/guru: teachers selectable as tasmi' pengampu.
async fn list_guru(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<Vec<GuruDetail>>> {
    Ok(Json(guru::list_active(&state.db.pg).await?))
}

/// Results are visible to the student only once published.
fn student_view(detail: TasmiDetail) -> TasmiDetail {
    if detail.tasmi.published_at.is_some() {
        detail
    } else {
        detail.hide_results()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TasmiOverview {
    tasmi: Vec<TasmiDetail>,
    total_juz_hafalan: f64,
    eligibility: TasmiEligibility,
    kelas_id: Option<Uuid>,
}

/// GET /api/siswa/tasmi: registrations plus the current eligibility verdict.
async fn list_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<TasmiOverview>> {
    let me = current_siswa(&state, &ctx).await?;
    let rows = tasmi::list_for_siswa(&state.db.pg, me.id).await?;
    let view = progress_view(&state, me.id).await?;
    Ok(Json(TasmiOverview {
        tasmi: rows.into_iter().map(student_view).collect(),
        total_juz_hafalan: view.summary.total_juz,
        eligibility: view.eligibility,
        kelas_id: me.kelas_id,
    }))
}

fn open_registration_error(state: &str) -> SimtaqError {
    SimtaqError::validation(format!(
        "Anda masih memiliki pendaftaran yang {state}. Selesaikan atau batalkan terlebih dahulu."
    ))
}

/// POST /api/siswa/tasmi
async fn daftar_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<DaftarTasmiRequest>,
) -> SimtaqResult<(StatusCode, Json<Tasmi>)> {
    let juz_yang_ditasmi = body.juz_yang_ditasmi.as_deref().map(str::trim).unwrap_or_default();
    let jam_tasmi = body.jam_tasmi.as_deref().map(str::trim).unwrap_or_default();
    require_fields(&[
        ("jumlahHafalan", body.jumlah_hafalan.is_some()),
        ("juzYangDitasmi", !juz_yang_ditasmi.is_empty()),
        ("jamTasmi", !jam_tasmi.is_empty()),
        ("tanggalTasmi", body.tanggal_tasmi.is_some()),
        ("guruId", body.guru_id.is_some()),
    ])?;
    let (Some(jumlah_hafalan), Some(tanggal_tasmi), Some(guru_id)) =
        (body.jumlah_hafalan, body.tanggal_tasmi, body.guru_id)
    else {
        return Err(SimtaqError::validation("Data tidak lengkap"));
    };
    if !(1..=30).contains(&jumlah_hafalan) {
        return Err(SimtaqError::validation("Jumlah hafalan harus 1-30 juz"));
    }

    let me = current_siswa(&state, &ctx).await?;
    if !can_perform(me.status_siswa, SiswaAction::SubmitTasmi) {
        return Err(SimtaqError::validation(format!(
            "Siswa berstatus {} tidak dapat mendaftar tasmi'",
            me.status_siswa.as_str()
        )));
    }
    let kelas_id = me
        .kelas_id
        .ok_or_else(|| SimtaqError::validation("Anda belum terdaftar di kelas manapun"))?;
    let pengampu = guru::find_by_id(&state.db.pg, guru_id)
        .await?
        .ok_or_else(|| SimtaqError::validation("Guru yang dipilih tidak valid"))?;

    let open = tasmi::find_open_for_siswa(&state.db.pg, me.id).await?;
    if let Some(open) = open.filter(|t| t.status_pendaftaran.is_open()) {
        return Err(open_registration_error(match open.status_pendaftaran {
            TasmiStatus::Menunggu => "menunggu verifikasi",
            _ => "sudah disetujui",
        }));
    }

    let view = progress_view(&state, me.id).await?;
    if !view.eligibility.is_eligible {
        return Err(SimtaqError::validation_with(
            view.eligibility.message.clone(),
            serde_json::json!({
                "completedJuzCount": view.eligibility.completed_juz,
                "targetJuzMinimal": view.eligibility.target_juz,
                "remainingJuz": view.eligibility.remaining_juz,
            }),
        ));
    }

    let created = tasmi::create(
        &state.db.pg,
        tasmi::NewTasmi {
            id: generate_id(),
            siswa_id: me.id,
            kelas_id: Some(kelas_id),
            guru_pengampu_id: pengampu.id,
            jumlah_hafalan,
            juz_yang_ditasmi,
            jam_tasmi,
            tanggal_tasmi,
            catatan: body.catatan.as_deref().map(str::trim).filter(|c| !c.is_empty()),
        },
    )
    .await
    .map_err(|e| on_unique_violation(e, || open_registration_error("belum selesai")))?;
    state.cache.invalidate(crate::cache::ADMIN_STATS);
    state.cache.invalidate(&format!("{}{}", crate::cache::GURU_STATS, pengampu.id));

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::SiswaDaftarTasmi, "Mendaftar tasmi'")
            .description(format!("Juz {juz_yang_ditasmi} pada {}", created.tanggal_tasmi))
            .metadata(serde_json::json!({ "tasmiId": created.id })),
    );
    state.push.spawn_notify(
        Audience::Users(vec![pengampu.user_id]),
        "TASMI",
        PushPayload::new(
            "Pendaftaran Tasmi' Baru",
            format!("{} mendaftar tasmi' juz {juz_yang_ditasmi}", ctx.name),
            "/guru/tasmi",
        ),
    );
    tracing::info!(siswa_id = %me.id, tasmi_id = %created.id, "Tasmi registration submitted");

    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/siswa/tasmi/{id}/cancel: only while MENUNGGU.
async fn cancel_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<Tasmi>> {
    let me = current_siswa(&state, &ctx).await?;
    let cancelled = tasmi::cancel(&state.db.pg, id, me.id)
        .await?
        .ok_or_else(|| SimtaqError::validation("Pendaftaran tidak ditemukan atau sudah diproses"))?;
    state.cache.invalidate(crate::cache::ADMIN_STATS);
    state
        .cache
        .invalidate(&format!("{}{}", crate::cache::GURU_STATS, cancelled.guru_pengampu_id));

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::SiswaBatalTasmi, "Membatalkan pendaftaran tasmi'")
            .metadata(serde_json::json!({ "tasmiId": id })),
    );

    Ok(Json(cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn detail(published: bool) -> TasmiDetail {
        let now = Utc::now();
        TasmiDetail {
            tasmi: Tasmi {
                id: Uuid::nil(),
                siswa_id: Uuid::nil(),
                kelas_id: None,
                guru_pengampu_id: Uuid::nil(),
                guru_verifikasi_id: None,
                guru_penguji_id: None,
                jumlah_hafalan: 3,
                juz_yang_ditasmi: "30".into(),
                jam_tasmi: "08:00".into(),
                tanggal_tasmi: now.date_naive(),
                tanggal_ujian: None,
                catatan: None,
                catatan_penolakan: None,
                status_pendaftaran: TasmiStatus::Selesai,
                nilai_kelancaran: Some(90.0),
                nilai_tajwid: Some(85.0),
                nilai_adab: Some(95.0),
                nilai_irama: Some(80.0),
                nilai_akhir: Some(87.5),
                predikat: Some("Sangat Baik".into()),
                is_passed: Some(true),
                catatan_penguji: None,
                published_at: published.then_some(now),
                tanggal_daftar: now,
                updated_at: now,
            },
            siswa_nama: "Ahmad".into(),
            siswa_nis: "001".into(),
            kelas_nama: None,
            guru_pengampu_nama: "Ustadz".into(),
            guru_penguji_nama: None,
        }
    }

    #[test]
    fn unpublished_results_stay_hidden() {
        assert_eq!(student_view(detail(false)).tasmi.nilai_akhir, None);
        assert_eq!(student_view(detail(true)).tasmi.nilai_akhir, Some(87.5));
    }
}
