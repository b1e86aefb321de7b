//! Announcements. Publishing one notifies every teacher, student and parent.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        pengumuman::{Pengumuman, PengumumanRequest, PushPayload},
        user::Role,
        Pagination,
    },
    validation::{page_params, validate_request},
};
use simtaq_db::repository::pengumuman;
use std::sync::Arc;
use uuid::Uuid;

use super::{PageQuery, Paged};
use crate::{
    activity,
    middleware::{AuthContext, ClientInfo},
    push::Audience,
    AppState,
};

const NOTIFICATION_KIND: &str = "PENGUMUMAN";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/pengumuman", get(list).post(create))
        .route("/admin/pengumuman/{id}", put(update).delete(remove))
}

fn check_window(body: &PengumumanRequest) -> SimtaqResult<()> {
    if let (Some(mulai), Some(selesai)) = (body.tanggal_mulai, body.tanggal_selesai) {
        if selesai < mulai {
            return Err(SimtaqError::validation("Tanggal selesai tidak boleh sebelum tanggal mulai"));
        }
    }
    Ok(())
}

/// Roles reached by an announcement: its target role, or every non-admin role.
fn audience_for(target: Option<Role>) -> Vec<Role> {
    match target {
        Some(Role::Admin) | None => vec![Role::Guru, Role::Siswa, Role::OrangTua],
        Some(role) => vec![role],
    }
}

/// GET /api/admin/pengumuman
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> SimtaqResult<Json<Paged<Pengumuman>>> {
    let (page, limit) = page_params(query.page, query.limit, 20);
    let total = pengumuman::count_all(&state.db.pg).await?;
    let pagination = Pagination::new(page, limit, total);
    let data = pengumuman::list_all(&state.db.pg, limit, pagination.offset()).await?;
    Ok(Json(Paged { data, pagination }))
}

/// POST /api/admin/pengumuman
async fn create(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<PengumumanRequest>,
) -> SimtaqResult<(StatusCode, Json<Pengumuman>)> {
    validate_request(&body)?;
    check_window(&body)?;

    let created = pengumuman::create(&state.db.pg, generate_id(), ctx.user_id, &body).await?;

    state.push.spawn_notify(
        Audience::Roles(audience_for(created.target_role)),
        NOTIFICATION_KIND,
        PushPayload::announcement(created.id, &created.judul),
    );
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminBuatPengumuman, "Membuat pengumuman")
            .description(created.judul.clone())
            .metadata(serde_json::json!({ "pengumumanId": created.id })),
    );
    tracing::info!(admin_id = %ctx.user_id, pengumuman_id = %created.id, "Announcement published");

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/pengumuman/{id}
async fn update(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<PengumumanRequest>,
) -> SimtaqResult<Json<Pengumuman>> {
    validate_request(&body)?;
    check_window(&body)?;

    let updated = pengumuman::update(&state.db.pg, id, &body)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Pengumuman"))?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahPengumuman, "Mengubah pengumuman")
            .description(updated.judul.clone()),
    );

    Ok(Json(updated))
}

/// DELETE /api/admin/pengumuman/{id}
async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let existing = pengumuman::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Pengumuman"))?;
    pengumuman::delete(&state.db.pg, id).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminHapusPengumuman, "Menghapus pengumuman")
            .description(existing.judul),
    );

    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_non_admin_role() {
        assert_eq!(audience_for(None), vec![Role::Guru, Role::Siswa, Role::OrangTua]);
        assert_eq!(audience_for(Some(Role::Admin)), vec![Role::Guru, Role::Siswa, Role::OrangTua]);
        assert_eq!(audience_for(Some(Role::Siswa)), vec![Role::Siswa]);
    }
}
