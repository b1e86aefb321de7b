//! School years. Exactly one may be active; its `targetHafalan` gates tasmi' registration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use simtaq_common::{
    error::{map_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        academic::{TahunAjaran, TahunAjaranRequest},
        activity::ActivityAction,
    },
    validation::validate_request,
};
use simtaq_db::repository::tahun_ajaran;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    activity,
    middleware::{AuthContext, ClientInfo},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/tahun-ajaran", get(list).post(create))
        .route("/admin/tahun-ajaran/{id}", put(update).delete(remove))
        .route("/admin/tahun-ajaran/{id}/activate", patch(activate))
        .route("/admin/tahun-ajaran/{id}/target", patch(set_target))
}

fn check_dates(body: &TahunAjaranRequest) -> SimtaqResult<()> {
    if body.tanggal_selesai <= body.tanggal_mulai {
        return Err(SimtaqError::validation("Tanggal selesai harus setelah tanggal mulai"));
    }
    Ok(())
}

/// GET /api/admin/tahun-ajaran
async fn list(State(state): State<Arc<AppState>>) -> SimtaqResult<Json<Vec<TahunAjaran>>> {
    Ok(Json(tahun_ajaran::list(&state.db.pg).await?))
}

/// POST /api/admin/tahun-ajaran: created inactive.
async fn create(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<TahunAjaranRequest>,
) -> SimtaqResult<(StatusCode, Json<TahunAjaran>)> {
    validate_request(&body)?;
    check_dates(&body)?;

    let created = tahun_ajaran::create(&state.db.pg, generate_id(), &body)
        .await
        .map_err(|e| map_unique_violation(e, "Tahun ajaran"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminTambahTahun, "Menambahkan tahun ajaran")
            .description(format!("{} semester {}", created.nama, created.semester)),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/tahun-ajaran/{id}
async fn update(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<TahunAjaranRequest>,
) -> SimtaqResult<Json<TahunAjaran>> {
    validate_request(&body)?;
    check_dates(&body)?;

    let updated = tahun_ajaran::update(&state.db.pg, id, &body)
        .await
        .map_err(|e| map_unique_violation(e, "Tahun ajaran"))?
        .ok_or_else(|| SimtaqError::not_found("Tahun ajaran"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahTahun, "Mengubah tahun ajaran")
            .description(format!("{} semester {}", updated.nama, updated.semester)),
    );

    Ok(Json(updated))
}

/// PATCH /api/admin/tahun-ajaran/{id}/activate: deactivates every other year.
async fn activate(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<TahunAjaran>> {
    let activated = tahun_ajaran::activate(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Tahun ajaran"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahTahun, "Mengaktifkan tahun ajaran")
            .description(format!("{} semester {}", activated.nama, activated.semester)),
    );
    tracing::info!(tahun_ajaran_id = %id, "School year activated");

    Ok(Json(activated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetRequest {
    target_hafalan: i32,
}

/// PATCH /api/admin/tahun-ajaran/{id}/target
async fn set_target(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<TargetRequest>,
) -> SimtaqResult<Json<TahunAjaran>> {
    if !(1..=30).contains(&body.target_hafalan) {
        return Err(SimtaqError::validation("Target hafalan harus 1-30 juz"));
    }

    let updated = tahun_ajaran::set_target(&state.db.pg, id, body.target_hafalan)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Tahun ajaran"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminSetTarget, "Mengatur target hafalan")
            .description(format!("{} juz untuk {}", body.target_hafalan, updated.nama)),
    );

    Ok(Json(updated))
}

/// DELETE /api/admin/tahun-ajaran/{id}: the active year cannot be deleted.
async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let year = tahun_ajaran::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Tahun ajaran"))?;
    if year.is_active {
        return Err(SimtaqError::validation("Tahun ajaran aktif tidak dapat dihapus"));
    }

    tahun_ajaran::delete(&state.db.pg, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
