//! Endpoints available to every signed-in role: announcements, in-app
//! notifications and push subscriptions.

use axum::{
    extract::{Path, Query, State},
    middleware::from_fn,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    ids::generate_id,
    models::pengumuman::{Notification, Pengumuman, SubscribeRequest, UnsubscribeRequest},
};
use simtaq_db::repository::{notifications, pengumuman, push_subscriptions};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    middleware::{auth_middleware, AuthContext, ClientInfo},
    AppState,
};

const NOTIFICATION_LIMIT: i64 = 10;

pub fn router() -> Router<Arc<AppState>> {
    let public = Router::new().route("/push/vapid-public-key", get(vapid_public_key));

    let authenticated = Router::new()
        .route("/pengumuman", get(list_pengumuman))
        .route("/notifications", get(list_notifications))
        .route("/notifications/count", get(count_unread))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/{id}/read", patch(mark_read))
        .route("/push/subscribe", post(subscribe))
        .route("/push/unsubscribe", post(unsubscribe))
        .route_layer(from_fn(auth_middleware));

    public.merge(authenticated)
}

#[derive(Deserialize)]
struct PengumumanQuery {
    limit: Option<i64>,
}

/// GET /api/pengumuman: announcements for my role inside their active window, pinned first.
async fn list_pengumuman(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<PengumumanQuery>,
) -> SimtaqResult<Json<Vec<Pengumuman>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(pengumuman::list_visible(&state.db.pg, ctx.role, limit).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationList {
    notifications: Vec<Notification>,
    unread_count: i64,
}

/// GET /api/notifications?unreadOnly=
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<NotificationQuery>,
) -> SimtaqResult<Json<NotificationList>> {
    let notifications =
        notifications::list_for_user(&state.db.pg, ctx.user_id, query.unread_only, NOTIFICATION_LIMIT).await?;
    let unread_count = notifications::count_unread(&state.db.pg, ctx.user_id).await?;
    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

/// GET /api/notifications/count
async fn count_unread(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let count = notifications::count_unread(&state.db.pg, ctx.user_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// PATCH /api/notifications/{id}/read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    if !notifications::mark_read(&state.db.pg, id, ctx.user_id).await? {
        return Err(SimtaqError::not_found("Notifikasi"));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

/// PATCH /api/notifications/read-all
async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let updated = notifications::mark_all_read(&state.db.pg, ctx.user_id).await?;
    Ok(Json(serde_json::json!({ "success": true, "updated": updated })))
}

/// GET /api/push/vapid-public-key
async fn vapid_public_key() -> SimtaqResult<Json<serde_json::Value>> {
    let push = &simtaq_common::config::get().push;
    match push.vapid_public_key.as_deref().filter(|_| push.is_configured()) {
        Some(key) => Ok(Json(serde_json::json!({ "publicKey": key }))),
        None => Err(SimtaqError::not_found("VAPID public key")),
    }
}

/// POST /api/push/subscribe: upsert by endpoint.
async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<SubscribeRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let endpoint = body.endpoint.trim();
    if !endpoint.starts_with("https://") || body.keys.p256dh.is_empty() || body.keys.auth.is_empty() {
        return Err(SimtaqError::validation("Data subscription tidak valid"));
    }

    let sub = push_subscriptions::upsert(
        &state.db.pg,
        generate_id(),
        ctx.user_id,
        endpoint,
        &body.keys.p256dh,
        &body.keys.auth,
        client.user_agent.as_deref(),
    )
    .await?;

    tracing::info!(user_id = %ctx.user_id, subscription_id = %sub.id, "Push subscription saved");
    Ok(Json(serde_json::json!({ "success": true, "id": sub.id })))
}

/// POST /api/push/unsubscribe
async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<UnsubscribeRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let removed = push_subscriptions::deactivate_endpoint(&state.db.pg, ctx.user_id, body.endpoint.trim()).await?;
    Ok(Json(serde_json::json!({ "success": true, "removed": removed })))
}
