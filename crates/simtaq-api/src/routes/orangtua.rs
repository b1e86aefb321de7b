//! Parent area. Every per-child view checks the parent link first.

use axum::{
    extract::{Path, Query, State},
    middleware::from_fn,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    models::{
        hafalan::Hafalan,
        people::{LinkedChild, OrangTuaDetail},
        tasmi::TasmiDetail,
    },
};
use simtaq_db::repository::{hafalan, orang_tua, tasmi};
use std::sync::Arc;
use uuid::Uuid;

use super::siswa::{penilaian_view, presensi_view, progress_view, PenilaianView, PresensiView, ProgressView, RangeQuery};
use crate::{
    middleware::{auth_middleware, require_orang_tua, AuthContext},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orangtua/profile", get(profile))
        .route("/orangtua/anak", get(list_children))
        .route("/orangtua/anak/{siswa_id}/hafalan", get(child_hafalan))
        .route("/orangtua/anak/{siswa_id}/penilaian", get(child_penilaian))
        .route("/orangtua/anak/{siswa_id}/presensi", get(child_presensi))
        .route("/orangtua/anak/{siswa_id}/progress", get(child_progress))
        .route("/orangtua/anak/{siswa_id}/tasmi", get(child_tasmi))
        .route_layer(from_fn(require_orang_tua))
        .route_layer(from_fn(auth_middleware))
}

async fn current_parent_id(state: &AppState, ctx: &AuthContext) -> SimtaqResult<Uuid> {
    orang_tua::find_by_user_id(&state.db.pg, ctx.user_id)
        .await?
        .map(|parent| parent.id)
        .ok_or_else(|| SimtaqError::not_found("Data orang tua"))
}

/// Resolve the caller and refuse children they are not linked to.
async fn ensure_child(state: &AppState, ctx: &AuthContext, siswa_id: Uuid) -> SimtaqResult<()> {
    let parent_id = current_parent_id(state, ctx).await?;
    if !orang_tua::is_parent_of(&state.db.pg, parent_id, siswa_id).await? {
        tracing::warn!(user_id = %ctx.user_id, %siswa_id, "Parent requested an unlinked student");
        return Err(SimtaqError::Forbidden);
    }
    Ok(())
}

#[derive(Serialize)]
struct Profile {
    #[serde(flatten)]
    parent: OrangTuaDetail,
    anak: Vec<LinkedChild>,
}

/// GET /api/orangtua/profile
async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<Profile>> {
    let parent_id = current_parent_id(&state, &ctx).await?;
    let parent = orang_tua::find_detail(&state.db.pg, parent_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Data orang tua"))?;
    let anak = orang_tua::children(&state.db.pg, parent_id).await?;
    Ok(Json(Profile { parent, anak }))
}

/// GET /api/orangtua/anak
async fn list_children(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<Vec<LinkedChild>>> {
    let parent_id = current_parent_id(&state, &ctx).await?;
    Ok(Json(orang_tua::children(&state.db.pg, parent_id).await?))
}

async fn child_hafalan(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(siswa_id): Path<Uuid>,
) -> SimtaqResult<Json<Vec<Hafalan>>> {
    ensure_child(&state, &ctx, siswa_id).await?;
    Ok(Json(hafalan::list_for_siswa(&state.db.pg, siswa_id).await?))
}

async fn child_penilaian(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(siswa_id): Path<Uuid>,
) -> SimtaqResult<Json<PenilaianView>> {
    ensure_child(&state, &ctx, siswa_id).await?;
    Ok(Json(penilaian_view(&state, siswa_id).await?))
}

async fn child_presensi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(siswa_id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> SimtaqResult<Json<PresensiView>> {
    ensure_child(&state, &ctx, siswa_id).await?;
    Ok(Json(presensi_view(&state, siswa_id, &range).await?))
}

async fn child_progress(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(siswa_id): Path<Uuid>,
) -> SimtaqResult<Json<ProgressView>> {
    ensure_child(&state, &ctx, siswa_id).await?;
    Ok(Json(progress_view(&state, siswa_id).await?))
}

/// Only published exam results reach parents.
async fn child_tasmi(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(siswa_id): Path<Uuid>,
) -> SimtaqResult<Json<Vec<TasmiDetail>>> {
    ensure_child(&state, &ctx, siswa_id).await?;
    Ok(Json(tasmi::list_published_for_siswa(&state.db.pg, siswa_id).await?))
}
