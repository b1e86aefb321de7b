use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        people::StatusSiswa,
        presensi::{BulkPresensiRequest, PresensiRosterRow, PresensiSummary},
    },
    status::{can_perform, SiswaAction},
};
use simtaq_db::repository::{activity_logs, kelas, presensi, siswa};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{current_guru, ensure_teaches};
use crate::{
    activity,
    middleware::{AuthContext, ClientInfo},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/guru/presensi", get(roster).post(save))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterQuery {
    kelas_id: Uuid,
    tanggal: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Roster {
    kelas_id: Uuid,
    tanggal: NaiveDate,
    siswa: Vec<PresensiRosterRow>,
    summary: PresensiSummary,
}

/// GET /api/guru/presensi?kelasId=&tanggal=
async fn roster(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<RosterQuery>,
) -> SimtaqResult<Json<Roster>> {
    let me = current_guru(&state, &ctx).await?;
    ensure_teaches(&state, me.id, Some(query.kelas_id)).await?;

    let tanggal = query.tanggal.unwrap_or_else(|| Utc::now().date_naive());
    let rows = presensi::roster(&state.db.pg, query.kelas_id, tanggal).await?;
    let summary = PresensiSummary::from_statuses(rows.iter().filter_map(|r| r.status));

    Ok(Json(Roster {
        kelas_id: query.kelas_id,
        tanggal,
        siswa: rows,
        summary,
    }))
}

/// Reject entries for students outside the class or no longer AKTIF.
fn check_entries(request: &BulkPresensiRequest, statuses: &HashMap<Uuid, StatusSiswa>) -> SimtaqResult<()> {
    let outside: Vec<Uuid> = request
        .presensi
        .iter()
        .map(|item| item.siswa_id)
        .filter(|id| !statuses.contains_key(id))
        .collect();
    if !outside.is_empty() {
        return Err(SimtaqError::validation_with(
            "Sebagian siswa bukan anggota kelas ini",
            serde_json::json!({ "siswaIds": outside }),
        ));
    }

    let inactive: Vec<Uuid> = request
        .presensi
        .iter()
        .map(|item| item.siswa_id)
        .filter(|id| {
            statuses
                .get(id)
                .is_some_and(|status| !can_perform(*status, SiswaAction::UpdatePresensi))
        })
        .collect();
    if !inactive.is_empty() {
        return Err(SimtaqError::validation_with(
            "Presensi hanya dapat diisi untuk siswa aktif",
            serde_json::json!({ "siswaIds": inactive }),
        ));
    }
    Ok(())
}

/// POST /api/guru/presensi: upsert a whole class for one day.
async fn save(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<BulkPresensiRequest>,
) -> SimtaqResult<Json<Roster>> {
    let kelas_id = body.kelas_id.ok_or_else(|| SimtaqError::validation("kelasId wajib diisi"))?;
    if body.presensi.is_empty() {
        return Err(SimtaqError::validation("Data presensi kosong"));
    }
    let tanggal = body.tanggal.unwrap_or_else(|| Utc::now().date_naive());

    let me = current_guru(&state, &ctx).await?;
    ensure_teaches(&state, me.id, Some(kelas_id)).await?;
    let class = kelas::find_by_id(&state.db.pg, kelas_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Kelas"))?;

    let statuses: HashMap<Uuid, StatusSiswa> = siswa::list_by_kelas(&state.db.pg, kelas_id)
        .await?
        .into_iter()
        .map(|s| (s.id, s.status_siswa))
        .collect();
    check_entries(&body, &statuses)?;

    let mut tx = state.db.pg.begin().await?;
    for item in &body.presensi {
        let keterangan = item.keterangan.as_deref().map(str::trim).filter(|k| !k.is_empty());
        presensi::upsert(&mut *tx, generate_id(), item.siswa_id, me.id, tanggal, item.status, keterangan).await?;
    }
    let entry = activity::by(&ctx, &client, ActivityAction::GuruUbahPresensi, "Mengisi presensi kelas")
        .description(format!("{} siswa di {} ({tanggal})", body.presensi.len(), class.nama))
        .metadata(serde_json::json!({ "kelasId": kelas_id, "tanggal": tanggal }));
    activity_logs::insert(&mut *tx, &entry).await?;
    tx.commit().await?;
    state.cache.invalidate(crate::cache::ADMIN_STATS);

    tracing::info!(guru_id = %me.id, kelas_id = %kelas_id, %tanggal, count = body.presensi.len(), "Attendance saved");

    let rows = presensi::roster(&state.db.pg, kelas_id, tanggal).await?;
    let summary = PresensiSummary::from_statuses(rows.iter().filter_map(|r| r.status));
    Ok(Json(Roster {
        kelas_id,
        tanggal,
        siswa: rows,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtaq_common::models::presensi::{PresensiItem, PresensiStatus};

    fn request(ids: &[Uuid]) -> BulkPresensiRequest {
        BulkPresensiRequest {
            kelas_id: Some(Uuid::nil()),
            tanggal: None,
            presensi: ids
                .iter()
                .map(|id| PresensiItem {
                    siswa_id: *id,
                    status: PresensiStatus::Hadir,
                    keterangan: None,
                })
                .collect(),
        }
    }

    #[test]
    fn entries_must_be_active_class_members() {
        let aktif = Uuid::from_u128(1);
        let lulus = Uuid::from_u128(2);
        let stranger = Uuid::from_u128(3);
        let statuses = HashMap::from([(aktif, StatusSiswa::Aktif), (lulus, StatusSiswa::Lulus)]);

        assert!(check_entries(&request(&[aktif]), &statuses).is_ok());
        assert!(check_entries(&request(&[aktif, stranger]), &statuses).is_err());
        assert!(check_entries(&request(&[lulus]), &statuses).is_err());
    }
}
