//! The teacher's own profile, signature, recent activity and dashboard.

use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    models::{
        academic::Kelas,
        activity::{format_time_ago, ActivityAction, ActivityLog},
        hafalan::PenilaianDetail,
        people::GuruDetail,
    },
};
use simtaq_db::repository::{
    activity_logs, guru, hafalan,
    stats::{self, GuruCounts},
};
use std::sync::Arc;

use super::current_guru;
use crate::{
    activity,
    cache,
    middleware::{AuthContext, ClientInfo},
    routes::uploads,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guru/profile", get(profile))
        .route("/guru/profile/ttd", post(upload_ttd))
        .route("/guru/aktivitas", get(recent_activity))
        .route("/guru/dashboard", get(dashboard))
}

#[derive(Serialize)]
struct Profile {
    #[serde(flatten)]
    guru: GuruDetail,
    kelas: Vec<Kelas>,
}

/// GET /api/guru/profile
async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<Profile>> {
    let me = current_guru(&state, &ctx).await?;
    let detail = guru::find_detail(&state.db.pg, me.id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Data guru"))?;
    let kelas = guru::kelas_of(&state.db.pg, me.id).await?;
    Ok(Json(Profile { guru: detail, kelas }))
}

/// POST /api/guru/profile/ttd (multipart: `file`)
async fn upload_ttd(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    multipart: Multipart,
) -> SimtaqResult<Json<serde_json::Value>> {
    let me = current_guru(&state, &ctx).await?;
    let form = uploads::read_image_form(multipart, &state.storage).await?;

    let key = format!(
        "ttd/ttd_{}_{}.{}",
        me.id,
        Utc::now().timestamp_millis(),
        form.image.extension()
    );
    let stored = uploads::store(&state.storage, &key, &form.image.bytes).await?;
    guru::set_ttd(&state.db.pg, me.id, &stored.public_url).await?;
    uploads::remove_by_url(&state.storage, me.ttd_url.as_deref()).await;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::GuruUploadTtd, "Mengunggah tanda tangan"),
    );
    tracing::info!(guru_id = %me.id, key = %stored.key, "Signature uploaded");

    Ok(Json(serde_json::json!({ "ttdUrl": stored.public_url })))
}

#[derive(Deserialize)]
struct ActivityQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityItem {
    #[serde(flatten)]
    log: ActivityLog,
    time_ago: String,
}

/// GET /api/guru/aktivitas?limit=
async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ActivityQuery>,
) -> SimtaqResult<Json<Vec<ActivityItem>>> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    let now = Utc::now();
    let items = activity_logs::recent_for_actor(&state.db.pg, ctx.user_id, limit)
        .await?
        .into_iter()
        .map(|log| ActivityItem {
            time_ago: format_time_ago(log.created_at, now),
            log,
        })
        .collect();
    Ok(Json(items))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuruDashboard {
    #[serde(flatten)]
    counts: GuruCounts,
    penilaian_terbaru: Vec<PenilaianDetail>,
}

/// GET /api/guru/dashboard, cached per teacher.
async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let me = current_guru(&state, &ctx).await?;
    let key = format!("{}{}", cache::GURU_STATS, me.id);
    if let Some(cached) = state.cache.get(&key) {
        return Ok(Json(cached));
    }

    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);
    let (counts, penilaian_terbaru) = tokio::try_join!(
        stats::guru_counts(&state.db.pg, me.id, month_start),
        hafalan::list_penilaian_by_guru(&state.db.pg, me.id, None, 5, 0),
    )?;

    let body = serde_json::to_value(GuruDashboard {
        counts,
        penilaian_terbaru,
    })
    .map_err(anyhow::Error::from)?;
    state.cache.set(key, body.clone());
    Ok(Json(body))
}
