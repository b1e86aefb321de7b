use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use simtaq_common::{
    error::SimtaqResult,
    models::{academic::Kelas, people::SiswaDetail},
};
use simtaq_db::repository::{guru, siswa};
use std::sync::Arc;
use uuid::Uuid;

use super::{current_guru, ensure_teaches};
use crate::{middleware::AuthContext, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guru/kelas", get(my_kelas))
        .route("/guru/kelas/{id}/siswa", get(kelas_siswa))
}

/// GET /api/guru/kelas
async fn my_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<Vec<Kelas>>> {
    let me = current_guru(&state, &ctx).await?;
    Ok(Json(guru::kelas_of(&state.db.pg, me.id).await?))
}

/// GET /api/guru/kelas/{id}/siswa
async fn kelas_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(kelas_id): Path<Uuid>,
) -> SimtaqResult<Json<Vec<SiswaDetail>>> {
    let me = current_guru(&state, &ctx).await?;
    ensure_teaches(&state, me.id, Some(kelas_id)).await?;
    Ok(Json(siswa::list_by_kelas(&state.db.pg, kelas_id).await?))
}
