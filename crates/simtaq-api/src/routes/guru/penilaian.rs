//! Hafalan grading. A penilaian always comes with the hafalan deposit it
//! grades; both are written in one transaction and the student's juz
//! progress is recomputed afterwards.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        hafalan::{nilai_akhir, Penilaian, PenilaianDetail, PenilaianRequest, SurahTambahan},
        people::{Guru, Siswa},
        user::Role,
        Pagination,
    },
    quran::{self, calculate_juz_progress, ranges_of},
    status::{can_perform, SiswaAction},
    validation::{page_params, require_fields, validate_score},
};
use simtaq_db::repository::{
    activity_logs,
    hafalan::{self, NewHafalan, Scores},
    siswa, users,
};
use sqlx::PgConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::{current_guru, ensure_teaches, notify_student_and_parents};
use crate::{
    activity,
    cache,
    middleware::{AuthContext, ClientInfo},
    routes::Paged,
    AppState,
};

const NOTIFICATION_KIND: &str = "PENILAIAN";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guru/penilaian", get(list).post(create))
        .route("/guru/penilaian/{id}", get(detail).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PenilaianQuery {
    page: Option<i64>,
    limit: Option<i64>,
    siswa_id: Option<Uuid>,
}

/// GET /api/guru/penilaian?siswaId=
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<PenilaianQuery>,
) -> SimtaqResult<Json<Paged<PenilaianDetail>>> {
    let me = current_guru(&state, &ctx).await?;
    let (page, limit) = page_params(query.page, query.limit, 20);

    let total = hafalan::count_penilaian_by_guru(&state.db.pg, me.id, query.siswa_id).await?;
    let pagination = Pagination::new(page, limit, total);
    let data =
        hafalan::list_penilaian_by_guru(&state.db.pg, me.id, query.siswa_id, limit, pagination.offset()).await?;

    Ok(Json(Paged { data, pagination }))
}

/// The four scores of a request, each 1-100, with their mean.
fn scores_of(body: &PenilaianRequest) -> SimtaqResult<Scores> {
    require_fields(&[
        ("tajwid", body.tajwid.is_some()),
        ("kelancaran", body.kelancaran.is_some()),
        ("makhraj", body.makhraj.is_some()),
        ("adab", body.adab.is_some()),
    ])?;
    let tajwid = body.tajwid.unwrap_or_default();
    let kelancaran = body.kelancaran.unwrap_or_default();
    let makhraj = body.makhraj.unwrap_or_default();
    let adab = body.adab.unwrap_or_default();

    for (field, value) in [
        ("tajwid", tajwid),
        ("kelancaran", kelancaran),
        ("makhraj", makhraj),
        ("adab", adab),
    ] {
        validate_score(field, value, 1.0, 100.0)?;
    }

    Ok(Scores {
        tajwid,
        kelancaran,
        makhraj,
        adab,
        nilai_akhir: nilai_akhir(&[tajwid, kelancaran, makhraj, adab]),
    })
}

/// Validated recited range of a request.
struct Setoran {
    juz: i32,
    surah: String,
    surah_number: Option<i32>,
    ayat_mulai: i32,
    ayat_selesai: i32,
    surah_tambahan: Vec<SurahTambahan>,
}

fn setoran_of(body: &PenilaianRequest) -> SimtaqResult<Setoran> {
    let surah = body.surah.as_deref().map(str::trim).unwrap_or_default();
    require_fields(&[
        ("juz", body.juz.is_some()),
        ("surah", !surah.is_empty()),
        ("ayatMulai", body.ayat_mulai.is_some()),
        ("ayatSelesai", body.ayat_selesai.is_some()),
    ])?;
    let juz = body.juz.unwrap_or_default();
    let ayat_mulai = body.ayat_mulai.unwrap_or_default();
    let ayat_selesai = body.ayat_selesai.unwrap_or_default();

    if !(1..=30).contains(&juz) {
        return Err(SimtaqError::validation("Juz harus antara 1 dan 30"));
    }
    if ayat_mulai < 1 || ayat_selesai < ayat_mulai {
        return Err(SimtaqError::validation("Rentang ayat tidak valid"));
    }

    let surah_number = quran::surah_number(surah);
    if let Some(number) = surah_number {
        let verses = quran::verses_in_surah(number).unwrap_or_default();
        if ayat_selesai > i32::from(verses) {
            return Err(SimtaqError::validation(format!(
                "Surah {surah} hanya memiliki {verses} ayat"
            )));
        }
        let covered = quran::juzs_in_range(number, ayat_mulai as u16, ayat_selesai as u16);
        if !covered.contains(&(juz as u8)) {
            return Err(SimtaqError::validation_with(
                format!("Surah {surah} ayat {ayat_mulai}-{ayat_selesai} tidak berada di juz {juz}"),
                serde_json::json!({ "juz": covered }),
            ));
        }
    }

    let surah = surah_number
        .and_then(quran::surah_name)
        .map(str::to_string)
        .unwrap_or_else(|| quran::normalize_surah_name(surah));

    Ok(Setoran {
        juz,
        surah,
        surah_number: surah_number.map(i32::from),
        ayat_mulai,
        ayat_selesai,
        surah_tambahan: SurahTambahan::sanitize(body.surah_tambahan.clone()),
    })
}

/// Recompute juz coverage from every deposit and store the highest juz reached.
async fn refresh_progress(conn: &mut PgConnection, siswa_id: Uuid) -> SimtaqResult<u32> {
    let deposits = hafalan::list_for_siswa(&mut *conn, siswa_id).await?;
    let ranges: Vec<_> = deposits.iter().flat_map(ranges_of).collect();
    let summary = calculate_juz_progress(&ranges);
    siswa::set_latest_juz(&mut *conn, siswa_id, summary.highest_juz_achieved as i32).await?;
    Ok(summary.highest_juz_achieved)
}

/// Student the teacher may grade: approved, in one of the teacher's classes.
async fn gradable_student(state: &AppState, me: &Guru, siswa_id: Uuid) -> SimtaqResult<Siswa> {
    let student = siswa::find_by_id(&state.db.pg, siswa_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    ensure_teaches(state, me.id, student.kelas_id).await?;
    Ok(student)
}

fn invalidate_dashboards(state: &AppState, guru_id: Uuid) {
    state.cache.invalidate(cache::ADMIN_STATS);
    state.cache.invalidate(&format!("{}{guru_id}", cache::GURU_STATS));
}

/// POST /api/guru/penilaian
async fn create(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<PenilaianRequest>,
) -> SimtaqResult<(StatusCode, Json<PenilaianDetail>)> {
    let siswa_id = body.siswa_id.ok_or_else(|| SimtaqError::validation("siswaId wajib diisi"))?;
    let setoran = setoran_of(&body)?;
    let scores = scores_of(&body)?;

    let me = current_guru(&state, &ctx).await?;
    let student = gradable_student(&state, &me, siswa_id).await?;
    if !can_perform(student.status_siswa, SiswaAction::AddHafalan) {
        return Err(SimtaqError::validation(format!(
            "Siswa berstatus {} tidak dapat menerima setoran baru",
            student.status_siswa.as_str()
        )));
    }
    let student_user = users::find_by_id(&state.db.pg, student.user_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Akun siswa"))?;

    let mut tx = state.db.pg.begin().await?;
    let deposit = hafalan::create_hafalan(
        &mut *tx,
        NewHafalan {
            id: generate_id(),
            siswa_id,
            guru_id: me.id,
            tanggal: body.tanggal.unwrap_or_else(|| Utc::now().date_naive()),
            juz: setoran.juz,
            surah: &setoran.surah,
            surah_number: setoran.surah_number,
            ayat_mulai: setoran.ayat_mulai,
            ayat_selesai: setoran.ayat_selesai,
            surah_tambahan: setoran.surah_tambahan,
            keterangan: body.keterangan.as_deref().map(str::trim).filter(|k| !k.is_empty()),
        },
    )
    .await?;
    let grade = hafalan::create_penilaian(
        &mut *tx,
        generate_id(),
        &deposit,
        scores,
        body.catatan.as_deref().map(str::trim).filter(|c| !c.is_empty()),
    )
    .await?;
    let highest_juz = refresh_progress(&mut tx, siswa_id).await?;

    let entry = activity::by(&ctx, &client, ActivityAction::GuruInputPenilaian, "Menginput penilaian hafalan")
        .description(format!(
            "{} ayat {}-{}, nilai {}",
            deposit.surah, deposit.ayat_mulai, deposit.ayat_selesai, grade.nilai_akhir
        ))
        .target(student_user.id, Role::Siswa, student_user.name.clone())
        .metadata(serde_json::json!({ "penilaianId": grade.id, "hafalanId": deposit.id }));
    activity_logs::insert(&mut *tx, &entry).await?;
    tx.commit().await?;
    invalidate_dashboards(&state, me.id);

    notify_student_and_parents(
        &state,
        student_user.id,
        siswa_id,
        NOTIFICATION_KIND,
        "Penilaian Hafalan Baru",
        &format!(
            "{} ayat {}-{} dinilai {}",
            deposit.surah, deposit.ayat_mulai, deposit.ayat_selesai, grade.nilai_akhir
        ),
        ("/siswa/penilaian-hafalan", "/orangtua/penilaian-hafalan"),
    )
    .await;
    tracing::info!(guru_id = %me.id, siswa_id = %siswa_id, penilaian_id = %grade.id, highest_juz, "Hafalan graded");

    let detail = hafalan::find_penilaian_detail(&state.db.pg, grade.id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penilaian"))?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Grade owned by the signed-in teacher.
async fn owned_penilaian(state: &AppState, me: &Guru, id: Uuid) -> SimtaqResult<Penilaian> {
    let grade = hafalan::find_penilaian(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penilaian"))?;
    if grade.guru_id != me.id {
        return Err(SimtaqError::Forbidden);
    }
    Ok(grade)
}

/// GET /api/guru/penilaian/{id}
async fn detail(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<PenilaianDetail>> {
    let me = current_guru(&state, &ctx).await?;
    owned_penilaian(&state, &me, id).await?;
    let detail = hafalan::find_penilaian_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penilaian"))?;
    Ok(Json(detail))
}

/// PUT /api/guru/penilaian/{id}
///
/// Scores are always replaced. The recited range is replaced only when the
/// request carries one.
async fn update(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<PenilaianRequest>,
) -> SimtaqResult<Json<PenilaianDetail>> {
    let scores = scores_of(&body)?;
    let setoran = if body.surah.is_some() || body.juz.is_some() {
        Some(setoran_of(&body)?)
    } else {
        None
    };

    let me = current_guru(&state, &ctx).await?;
    let grade = owned_penilaian(&state, &me, id).await?;
    let deposit = hafalan::find_hafalan(&state.db.pg, grade.hafalan_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Hafalan"))?;

    let mut tx = state.db.pg.begin().await?;
    if let Some(setoran) = setoran {
        hafalan::update_hafalan(
            &mut *tx,
            deposit.id,
            NewHafalan {
                id: deposit.id,
                siswa_id: deposit.siswa_id,
                guru_id: deposit.guru_id,
                tanggal: body.tanggal.unwrap_or(deposit.tanggal),
                juz: setoran.juz,
                surah: &setoran.surah,
                surah_number: setoran.surah_number,
                ayat_mulai: setoran.ayat_mulai,
                ayat_selesai: setoran.ayat_selesai,
                surah_tambahan: setoran.surah_tambahan,
                keterangan: body.keterangan.as_deref().or(deposit.keterangan.as_deref()),
            },
        )
        .await?;
    }
    let updated = hafalan::update_penilaian(
        &mut *tx,
        id,
        scores,
        body.catatan.as_deref().map(str::trim).filter(|c| !c.is_empty()),
    )
    .await?;
    refresh_progress(&mut tx, grade.siswa_id).await?;

    let entry = activity::by(&ctx, &client, ActivityAction::GuruEditPenilaian, "Mengubah penilaian hafalan")
        .description(format!("Nilai akhir {} menjadi {}", grade.nilai_akhir, updated.nilai_akhir))
        .metadata(serde_json::json!({ "penilaianId": id }));
    activity_logs::insert(&mut *tx, &entry).await?;
    tx.commit().await?;
    invalidate_dashboards(&state, me.id);

    let detail = hafalan::find_penilaian_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Penilaian"))?;
    Ok(Json(detail))
}

/// DELETE /api/guru/penilaian/{id}: removes the grade and its deposit.
async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let me = current_guru(&state, &ctx).await?;
    let grade = owned_penilaian(&state, &me, id).await?;

    hafalan::delete_penilaian(&state.db.pg, &grade).await?;
    let mut conn = state.db.pg.acquire().await?;
    refresh_progress(&mut conn, grade.siswa_id).await?;
    invalidate_dashboards(&state, me.id);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruHapusPenilaian, "Menghapus penilaian hafalan")
            .metadata(serde_json::json!({ "penilaianId": id, "siswaId": grade.siswa_id })),
    );

    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(scores: [Option<f64>; 4]) -> PenilaianRequest {
        PenilaianRequest {
            siswa_id: Some(Uuid::nil()),
            tanggal: None,
            juz: Some(30),
            surah: Some("An-Naba".into()),
            ayat_mulai: Some(1),
            ayat_selesai: Some(40),
            surah_tambahan: vec![],
            keterangan: None,
            tajwid: scores[0],
            kelancaran: scores[1],
            makhraj: scores[2],
            adab: scores[3],
            catatan: None,
        }
    }

    #[test]
    fn final_score_is_mean_of_four() {
        let scores = scores_of(&request([Some(80.0), Some(85.0), Some(90.0), Some(95.0)])).unwrap();
        assert_eq!(scores.nilai_akhir, 87.5);
    }

    #[test]
    fn scores_must_be_present_and_in_range() {
        assert!(scores_of(&request([Some(80.0), None, Some(90.0), Some(95.0)])).is_err());
        assert!(scores_of(&request([Some(0.0), Some(85.0), Some(90.0), Some(95.0)])).is_err());
        assert!(scores_of(&request([Some(101.0), Some(85.0), Some(90.0), Some(95.0)])).is_err());
        assert!(scores_of(&request([Some(1.0), Some(100.0), Some(1.0), Some(100.0)])).is_ok());
    }

    #[test]
    fn range_is_checked_against_the_surah() {
        let ok = setoran_of(&request([None; 4])).unwrap();
        assert_eq!(ok.surah_number, Some(78));

        let mut too_long = request([None; 4]);
        too_long.ayat_selesai = Some(41);
        assert!(setoran_of(&too_long).is_err());

        let mut reversed = request([None; 4]);
        reversed.ayat_mulai = Some(10);
        reversed.ayat_selesai = Some(5);
        assert!(setoran_of(&reversed).is_err());

        let mut bad_juz = request([None; 4]);
        bad_juz.juz = Some(31);
        assert!(setoran_of(&bad_juz).is_err());

        let mut wrong_juz = request([None; 4]);
        wrong_juz.juz = Some(29);
        assert!(setoran_of(&wrong_juz).is_err());
    }

    #[test]
    fn surah_name_is_stored_in_canonical_form() {
        let mut body = request([None; 4]);
        body.surah = Some("an naba".into());
        assert_eq!(setoran_of(&body).unwrap().surah, "An-Naba");

        body.surah = Some("surat pilihan".into());
        body.juz = Some(30);
        assert_eq!(setoran_of(&body).unwrap().surah, "Surat-Pilihan");
    }
}
