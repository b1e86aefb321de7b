//! Classes and their teacher assignments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use simtaq_common::{
    error::{map_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        academic::{AssignGuruRequest, GuruKelas, Kelas, KelasRequest, KelasSummary, PeranGuru},
        activity::ActivityAction,
        user::Role,
    },
    validation::validate_request,
};
use simtaq_db::repository::{guru, kelas};
use std::sync::Arc;
use uuid::Uuid;

use super::invalidate_stats;
use crate::{
    activity,
    middleware::{AuthContext, ClientInfo},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/kelas", get(list_kelas).post(create_kelas))
        .route("/admin/kelas/{id}", axum::routing::put(update_kelas).delete(delete_kelas))
        .route("/admin/kelas/{id}/toggle", patch(toggle_kelas))
        .route("/admin/kelas/{id}/guru", get(list_kelas_guru).post(assign_guru))
        .route("/admin/kelas/{id}/guru/{guru_id}", delete(remove_guru))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KelasQuery {
    tahun_ajaran_id: Option<Uuid>,
}

/// GET /api/admin/kelas?tahunAjaranId=
async fn list_kelas(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KelasQuery>,
) -> SimtaqResult<Json<Vec<KelasSummary>>> {
    Ok(Json(kelas::list(&state.db.pg, query.tahun_ajaran_id).await?))
}

/// POST /api/admin/kelas
async fn create_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<KelasRequest>,
) -> SimtaqResult<(StatusCode, Json<Kelas>)> {
    validate_request(&body)?;

    let created = kelas::create(
        &state.db.pg,
        generate_id(),
        body.nama.trim(),
        body.tahun_ajaran_id,
        body.target_juz,
    )
    .await
    .map_err(|e| map_unique_violation(e, "Nama kelas"))?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminTambahKelas, "Menambahkan kelas")
            .description(created.nama.clone())
            .metadata(serde_json::json!({ "kelasId": created.id })),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/kelas/{id}
async fn update_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<KelasRequest>,
) -> SimtaqResult<Json<Kelas>> {
    validate_request(&body)?;

    let updated = kelas::update(
        &state.db.pg,
        id,
        body.nama.trim(),
        body.tahun_ajaran_id,
        body.target_juz,
    )
    .await
    .map_err(|e| map_unique_violation(e, "Nama kelas"))?
    .ok_or_else(|| SimtaqError::not_found("Kelas"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahKelas, "Mengubah kelas")
            .description(updated.nama.clone())
            .metadata(serde_json::json!({ "kelasId": id })),
    );

    Ok(Json(updated))
}

/// DELETE /api/admin/kelas/{id}: refused while students are still assigned.
async fn delete_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let existing = kelas::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Kelas"))?;

    let students = kelas::count_students(&state.db.pg, id).await?;
    if students > 0 {
        return Err(SimtaqError::validation_with(
            format!("Kelas masih memiliki {students} siswa. Pindahkan siswa terlebih dahulu"),
            serde_json::json!({ "jumlahSiswa": students }),
        ));
    }

    kelas::delete(&state.db.pg, id).await?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminHapusKelas, "Menghapus kelas")
            .description(existing.nama),
    );

    Ok(Json(serde_json::json!({ "success": true })))
}

/// PATCH /api/admin/kelas/{id}/toggle
async fn toggle_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<Kelas>> {
    let updated = kelas::toggle_active(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Kelas"))?;
    invalidate_stats(&state);

    let title = if updated.is_active { "Mengaktifkan kelas" } else { "Menonaktifkan kelas" };
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahKelas, title).description(updated.nama.clone()),
    );

    Ok(Json(updated))
}

/// GET /api/admin/kelas/{id}/guru
async fn list_kelas_guru(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<Vec<GuruKelas>>> {
    Ok(Json(kelas::list_guru(&state.db.pg, id).await?))
}

/// Assign a teacher; a new UTAMA demotes the previous one to PENDAMPING.
pub(super) async fn assign_guru_to_kelas(
    state: &AppState,
    ctx: &AuthContext,
    client: &ClientInfo,
    kelas_id: Uuid,
    request: AssignGuruRequest,
) -> SimtaqResult<()> {
    let target = kelas::find_by_id(&state.db.pg, kelas_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Kelas"))?;
    let teacher = guru::find_detail(&state.db.pg, request.guru_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;
    let peran = request.peran.unwrap_or(PeranGuru::Pendamping);

    let mut tx = state.db.pg.begin().await?;
    if peran == PeranGuru::Utama {
        kelas::demote_utama(&mut *tx, kelas_id).await?;
    }
    kelas::assign_guru(&mut *tx, generate_id(), teacher.id, kelas_id, peran).await?;
    tx.commit().await?;
    invalidate_stats(state);

    activity::record(
        &state.db.pg,
        activity::by(ctx, client, ActivityAction::AdminUbahKelas, "Menugaskan guru ke kelas")
            .description(format!("{} di {}", teacher.name, target.nama))
            .target(teacher.user_id, Role::Guru, teacher.name.clone())
            .metadata(serde_json::json!({ "kelasId": kelas_id, "peran": peran })),
    );
    tracing::info!(kelas_id = %kelas_id, guru_id = %teacher.id, ?peran, "Teacher assigned to class");
    Ok(())
}

/// POST /api/admin/kelas/{id}/guru
async fn assign_guru(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignGuruRequest>,
) -> SimtaqResult<Json<Vec<GuruKelas>>> {
    assign_guru_to_kelas(&state, &ctx, &client, id, body).await?;
    Ok(Json(kelas::list_guru(&state.db.pg, id).await?))
}

/// DELETE /api/admin/kelas/{id}/guru/{guru_id}
async fn remove_guru(
    State(state): State<Arc<AppState>>,
    Path((id, guru_id)): Path<(Uuid, Uuid)>,
) -> SimtaqResult<Json<serde_json::Value>> {
    if !kelas::remove_guru(&state.db.pg, id, guru_id).await? {
        return Err(SimtaqError::not_found("Penugasan guru"));
    }
    invalidate_stats(&state);
    Ok(Json(serde_json::json!({ "success": true })))
}
