//! Tasmi' registrations from the examiner's side.
//!
//! `MENUNGGU -> DISETUJUI` (scheduled) or `DITOLAK`; a scheduled exam is
//! graded into `SELESAI`. Results stay hidden from the student until
//! published.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use simtaq_common::{
    config,
    error::{SimtaqError, SimtaqResult},
    models::{
        laporan::ReportPeriod,
        activity::ActivityAction,
        hafalan::nilai_akhir,
        people::Guru,
        tasmi::{
            predikat_for, ApproveTasmiRequest, GradeTasmiRequest, RejectTasmiRequest, Tasmi, TasmiDetail,
            TasmiStatus,
        },
        user::Role,
    },
    validation::validate_score,
};
use simtaq_db::repository::{siswa, tasmi};
use std::sync::Arc;
use uuid::Uuid;

use super::{current_guru, notify_student_and_parents};
use crate::{
    activity,
    cache,
    certificate::render_blocking,
    middleware::{AuthContext, ClientInfo},
    report::{self, ExportFormat, Orientation, Report},
    routes::{
        laporan::{find_kelas, today},
        uploads::sanitize_filename,
    },
    AppState,
};

const NOTIFICATION_KIND: &str = "TASMI";
/// Minimum final score that passes when the examiner does not decide explicitly.
const PASSING_SCORE: f64 = 70.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guru/tasmi", get(list))
        .route("/guru/tasmi/{id}/approve", patch(approve))
        .route("/guru/tasmi/{id}/reject", patch(reject))
        .route("/guru/tasmi/{id}/grade", post(grade))
        .route("/guru/tasmi/{id}/publish", patch(publish))
        .route("/guru/tasmi/{id}/pdf", get(result_pdf))
        .route("/guru/tasmi/rekap", get(rekap))
}

#[derive(Debug, Deserialize)]
struct TasmiQuery {
    status: Option<TasmiStatus>,
}

/// GET /api/guru/tasmi?status=
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<TasmiQuery>,
) -> SimtaqResult<Json<Vec<TasmiDetail>>> {
    let me = current_guru(&state, &ctx).await?;
    Ok(Json(tasmi::list_for_guru(&state.db.pg, me.id, query.status).await?))
}

/// Registration handled by this teacher as pengampu or penguji.
async fn handled_tasmi(state: &AppState, me: &Guru, id: Uuid) -> SimtaqResult<TasmiDetail> {
    let detail = tasmi::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Pendaftaran tasmi'"))?;
    let t = &detail.tasmi;
    if t.guru_pengampu_id != me.id && t.guru_penguji_id != Some(me.id) {
        return Err(SimtaqError::Forbidden);
    }
    Ok(detail)
}

fn require_status(t: &Tasmi, expected: TasmiStatus, message: &str) -> SimtaqResult<()> {
    if t.status_pendaftaran != expected {
        return Err(SimtaqError::validation(message));
    }
    Ok(())
}

async fn student_user_id(state: &AppState, siswa_id: Uuid) -> SimtaqResult<Uuid> {
    siswa::find_by_id(&state.db.pg, siswa_id)
        .await?
        .map(|s| s.user_id)
        .ok_or_else(|| SimtaqError::not_found("Siswa"))
}

fn invalidate_dashboards(state: &AppState, guru_id: Uuid) {
    state.cache.invalidate(cache::ADMIN_STATS);
    state.cache.invalidate(&format!("{}{guru_id}", cache::GURU_STATS));
}

/// PATCH /api/guru/tasmi/{id}/approve
async fn approve(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveTasmiRequest>,
) -> SimtaqResult<Json<Tasmi>> {
    let tanggal_ujian = body
        .tanggal_ujian
        .ok_or_else(|| SimtaqError::validation("Tanggal ujian wajib diisi"))?;

    let me = current_guru(&state, &ctx).await?;
    let detail = handled_tasmi(&state, &me, id).await?;
    require_status(&detail.tasmi, TasmiStatus::Menunggu, "Pendaftaran sudah diproses")?;

    let catatan = body.catatan.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let updated = tasmi::approve(&state.db.pg, id, me.id, tanggal_ujian, catatan).await?;
    invalidate_dashboards(&state, me.id);

    let siswa_user = student_user_id(&state, updated.siswa_id).await?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruJadwalTasmi, "Menjadwalkan ujian tasmi'")
            .description(format!("Juz {} pada {tanggal_ujian}", updated.juz_yang_ditasmi))
            .target(siswa_user, Role::Siswa, detail.siswa_nama.clone())
            .metadata(serde_json::json!({ "tasmiId": id })),
    );
    notify_student_and_parents(
        &state,
        siswa_user,
        updated.siswa_id,
        NOTIFICATION_KIND,
        "Pendaftaran Tasmi' Disetujui",
        &format!("Ujian tasmi' dijadwalkan pada {tanggal_ujian}"),
        ("/siswa/tasmi", "/orangtua/tasmi"),
    )
    .await;

    Ok(Json(updated))
}

/// PATCH /api/guru/tasmi/{id}/reject
async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectTasmiRequest>,
) -> SimtaqResult<Json<Tasmi>> {
    let alasan = body
        .catatan_penolakan
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SimtaqError::validation("Alasan penolakan wajib diisi"))?
        .to_string();

    let me = current_guru(&state, &ctx).await?;
    let detail = handled_tasmi(&state, &me, id).await?;
    require_status(&detail.tasmi, TasmiStatus::Menunggu, "Pendaftaran sudah diproses")?;

    let updated = tasmi::reject(&state.db.pg, id, me.id, &alasan).await?;
    invalidate_dashboards(&state, me.id);

    let siswa_user = student_user_id(&state, updated.siswa_id).await?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruTolakTasmi, "Menolak pendaftaran tasmi'")
            .description(alasan.clone())
            .target(siswa_user, Role::Siswa, detail.siswa_nama.clone())
            .metadata(serde_json::json!({ "tasmiId": id })),
    );
    notify_student_and_parents(
        &state,
        siswa_user,
        updated.siswa_id,
        NOTIFICATION_KIND,
        "Pendaftaran Tasmi' Ditolak",
        &alasan,
        ("/siswa/tasmi", "/orangtua/tasmi"),
    )
    .await;

    Ok(Json(updated))
}

/// Final scores: four components in 0-100, mean as default final score,
/// predicate and pass flag derived when not given.
struct Graded {
    kelancaran: f64,
    tajwid: f64,
    adab: f64,
    irama: f64,
    akhir: f64,
    predikat: String,
    is_passed: bool,
}

fn graded(body: &GradeTasmiRequest) -> SimtaqResult<Graded> {
    let components = [
        ("kelancaran", body.nilai_kelancaran),
        ("tajwid", body.nilai_tajwid),
        ("adab", body.nilai_adab),
        ("irama", body.nilai_irama),
    ];
    let mut values = [0.0; 4];
    for (slot, (field, value)) in values.iter_mut().zip(components) {
        let value = value.ok_or_else(|| SimtaqError::validation("Data penilaian tidak lengkap"))?;
        validate_score(field, value, 0.0, 100.0)?;
        *slot = value;
    }

    let akhir = match body.nilai_akhir {
        Some(value) => {
            validate_score("akhir", value, 0.0, 100.0)?;
            value
        }
        None => nilai_akhir(&values),
    };
    let predikat = body
        .predikat
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| predikat_for(akhir))
        .to_string();

    let [kelancaran, tajwid, adab, irama] = values;
    Ok(Graded {
        kelancaran,
        tajwid,
        adab,
        irama,
        akhir,
        predikat,
        is_passed: body.is_passed.unwrap_or(akhir >= PASSING_SCORE),
    })
}

/// POST /api/guru/tasmi/{id}/grade
async fn grade(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<GradeTasmiRequest>,
) -> SimtaqResult<Json<Tasmi>> {
    let scores = graded(&body)?;

    let me = current_guru(&state, &ctx).await?;
    let detail = handled_tasmi(&state, &me, id).await?;
    require_status(
        &detail.tasmi,
        TasmiStatus::Disetujui,
        "Pendaftaran harus disetujui terlebih dahulu",
    )?;
    if detail.tasmi.tanggal_ujian.is_none() {
        return Err(SimtaqError::validation("Jadwal ujian harus ditentukan terlebih dahulu"));
    }

    let updated = tasmi::grade(
        &state.db.pg,
        id,
        tasmi::TasmiGrade {
            guru_penguji_id: me.id,
            nilai_kelancaran: scores.kelancaran,
            nilai_tajwid: scores.tajwid,
            nilai_adab: scores.adab,
            nilai_irama: scores.irama,
            nilai_akhir: scores.akhir,
            predikat: &scores.predikat,
            is_passed: scores.is_passed,
            catatan_penguji: body.catatan_penguji.as_deref().map(str::trim).filter(|c| !c.is_empty()),
            publish: body.publish,
        },
    )
    .await?;
    invalidate_dashboards(&state, me.id);

    let siswa_user = student_user_id(&state, updated.siswa_id).await?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruNilaiTasmi, "Menilai ujian tasmi'")
            .description(format!("Nilai {} ({})", scores.akhir, scores.predikat))
            .target(siswa_user, Role::Siswa, detail.siswa_nama.clone())
            .metadata(serde_json::json!({ "tasmiId": id, "published": body.publish })),
    );
    if body.publish {
        announce_result(&state, siswa_user, &updated).await;
    }
    tracing::info!(tasmi_id = %id, nilai_akhir = scores.akhir, passed = scores.is_passed, "Tasmi graded");

    Ok(Json(updated))
}

async fn announce_result(state: &AppState, siswa_user: Uuid, t: &Tasmi) {
    notify_student_and_parents(
        state,
        siswa_user,
        t.siswa_id,
        NOTIFICATION_KIND,
        "Hasil Tasmi' Tersedia",
        &format!("Hasil ujian tasmi' juz {} sudah dapat dilihat", t.juz_yang_ditasmi),
        ("/siswa/tasmi", "/orangtua/tasmi"),
    )
    .await;
}

/// PATCH /api/guru/tasmi/{id}/publish
async fn publish(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<Tasmi>> {
    let me = current_guru(&state, &ctx).await?;
    let detail = handled_tasmi(&state, &me, id).await?;
    require_status(&detail.tasmi, TasmiStatus::Selesai, "Tasmi' belum dinilai")?;
    if detail.tasmi.published_at.is_some() {
        return Err(SimtaqError::validation("Hasil tasmi' sudah dipublikasikan"));
    }

    let updated = tasmi::publish(&state.db.pg, id).await?;
    let siswa_user = student_user_id(&state, updated.siswa_id).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruPublishTasmi, "Mempublikasikan hasil tasmi'")
            .target(siswa_user, Role::Siswa, detail.siswa_nama.clone())
            .metadata(serde_json::json!({ "tasmiId": id })),
    );
    announce_result(&state, siswa_user, &updated).await;

    Ok(Json(updated))
}

/// GET /api/guru/tasmi/{id}/pdf: result sheet of a graded exam.
async fn result_pdf(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Response> {
    let me = current_guru(&state, &ctx).await?;
    let detail = handled_tasmi(&state, &me, id).await?;
    let doc = report::tasmi_result_report(&detail, &config::get().school, today())?;
    let bytes = render_blocking(move || report::render(&doc)).await?;

    let filename = sanitize_filename(&format!(
        "Hasil_Tasmi_{}_{}.pdf",
        detail.siswa_nama.trim(),
        detail.tasmi.tanggal_ujian.unwrap_or_else(today).format("%Y%m%d")
    ));
    Ok(report::pdf_attachment(bytes, &filename))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RekapQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    kelas_id: Option<Uuid>,
    #[serde(default)]
    format: ExportFormat,
}

impl RekapQuery {
    fn period(&self) -> SimtaqResult<ReportPeriod> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => ReportPeriod::new(from, to),
            _ => Err(SimtaqError::validation("Parameter from dan to wajib diisi")),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TasmiRekap {
    periode: ReportPeriod,
    jumlah_peserta: usize,
    rata_rata: Option<f64>,
    data: Vec<TasmiDetail>,
}

/// GET /api/guru/tasmi/rekap?from=&to=&kelasId=&format=json|pdf|csv
async fn rekap(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<RekapQuery>,
) -> SimtaqResult<Response> {
    let periode = query.period()?;
    let me = current_guru(&state, &ctx).await?;
    let rows = tasmi::list_graded_for_guru(&state.db.pg, me.id, periode.from, periode.to, query.kelas_id).await?;
    let rata_rata = report::tasmi_average(&rows);

    let stem = format!(
        "Rekap_Tasmi_{}_{}",
        periode.from.format("%Y%m%d"),
        periode.to.format("%Y%m%d")
    );
    match query.format {
        ExportFormat::Json => Ok(Json(TasmiRekap {
            periode,
            jumlah_peserta: rows.len(),
            rata_rata,
            data: rows,
        })
        .into_response()),
        ExportFormat::Csv => {
            let bytes = report::to_csv(&report::tasmi_rekap_table(&rows)).map_err(SimtaqError::Internal)?;
            Ok(report::csv_attachment(bytes, &format!("{stem}.csv")))
        }
        ExportFormat::Pdf => {
            let kelas = match query.kelas_id {
                Some(id) => find_kelas(&state, id).await?.nama,
                None => "Semua kelas".to_string(),
            };
            let school = &config::get().school;
            let doc = Report {
                school: school.name.clone(),
                title: "Rekap Hasil Ujian Tasmi' Al-Qur'an".into(),
                orientation: Orientation::Landscape,
                meta: vec![
                    ("Guru".into(), ctx.name.clone()),
                    ("Kelas".into(), kelas),
                    ("Periode".into(), report::period_label(periode)),
                ],
                table: report::tasmi_rekap_table(&rows),
                summary: vec![
                    ("Jumlah peserta".into(), rows.len().to_string()),
                    (
                        "Rata-rata nilai akhir".into(),
                        rata_rata.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
                    ),
                ],
                note: None,
                place_date: Some(report::place_date(school, today())),
            };
            let bytes = render_blocking(move || report::render(&doc)).await?;
            Ok(report::pdf_attachment(bytes, &format!("{stem}.pdf")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kelancaran: Option<f64>) -> GradeTasmiRequest {
        GradeTasmiRequest {
            nilai_kelancaran: kelancaran,
            nilai_tajwid: Some(80.0),
            nilai_adab: Some(90.0),
            nilai_irama: Some(70.0),
            nilai_akhir: None,
            predikat: None,
            is_passed: None,
            catatan_penguji: None,
            publish: false,
        }
    }

    #[test]
    fn defaults_are_derived_from_the_mean() {
        let g = graded(&request(Some(100.0))).unwrap();
        assert_eq!(g.akhir, 85.0);
        assert_eq!(g.predikat, "Jayyid Jiddan");
        assert!(g.is_passed);
    }

    #[test]
    fn explicit_values_win() {
        let mut body = request(Some(50.0));
        body.nilai_akhir = Some(60.0);
        body.predikat = Some("Maqbul".into());
        body.is_passed = Some(true);
        let g = graded(&body).unwrap();
        assert_eq!((g.akhir, g.predikat.as_str(), g.is_passed), (60.0, "Maqbul", true));
    }

    #[test]
    fn missing_or_out_of_range_scores_fail() {
        assert!(graded(&request(None)).is_err());
        assert!(graded(&request(Some(-1.0))).is_err());
        assert!(graded(&request(Some(100.5))).is_err());
        assert!(graded(&request(Some(0.0))).is_ok());
    }

    #[test]
    fn recap_needs_an_ordered_range() {
        let date = |d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap();
        let q = |from, to| RekapQuery { from, to, ..Default::default() };
        assert!(q(None, Some(date(30))).period().is_err());
        assert!(q(Some(date(30)), Some(date(1))).period().is_err());
        let periode = q(Some(date(1)), Some(date(30))).period().unwrap();
        assert_eq!((periode.from, periode.to), (date(1), date(30)));
    }
}
