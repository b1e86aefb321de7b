//! Parent administration and parent-student links.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    credentials,
    error::{map_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        people::{LinkSiswaRequest, LinkedChild, OrangTuaDetail, OrangTuaRequest, StatusSiswa},
        user::Role,
        Pagination,
    },
    status::{parent_display_status, ParentDisplayStatus},
    validation::{page_params, validate_phone, validate_request},
};
use simtaq_db::repository::{activity_logs, orang_tua, siswa, users};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{invalidate_stats, non_blank, Paged};
use crate::{
    activity,
    auth,
    middleware::{AuthContext, ClientInfo},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/orangtua", get(list_orang_tua).post(create_orang_tua))
        .route(
            "/admin/orangtua/{id}",
            get(get_orang_tua).put(update_orang_tua).delete(delete_orang_tua),
        )
        .route("/admin/orangtua/{id}/reset-password", post(reset_password))
        .route("/admin/orangtua/{id}/siswa", post(link_siswa))
        .route("/admin/orangtua/{id}/siswa/{siswa_id}", delete(unlink_siswa))
}

/// A parent with their children and the status shown in listings.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrangTuaView {
    #[serde(flatten)]
    orang_tua: OrangTuaDetail,
    children: Vec<LinkedChild>,
    #[serde(flatten)]
    status: ParentDisplayStatus,
}

impl OrangTuaView {
    fn new(orang_tua: OrangTuaDetail, children: Vec<LinkedChild>) -> Self {
        let statuses: Vec<StatusSiswa> = children.iter().map(|c| c.status_siswa).collect();
        let status = parent_display_status(orang_tua.is_active, &statuses);
        Self {
            orang_tua,
            children,
            status,
        }
    }
}

async fn load_view(state: &AppState, id: Uuid) -> SimtaqResult<OrangTuaView> {
    let detail = orang_tua::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;
    let children = orang_tua::children(&state.db.pg, id).await?;
    Ok(OrangTuaView::new(detail, children))
}

#[derive(Debug, Deserialize)]
struct OrangTuaQuery {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
}

/// GET /api/admin/orangtua
async fn list_orang_tua(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrangTuaQuery>,
) -> SimtaqResult<Json<Paged<OrangTuaView>>> {
    let (page, limit) = page_params(query.page, query.limit, 20);
    let search = query.search.as_deref();

    let total = orang_tua::count(&state.db.pg, search).await?;
    let pagination = Pagination::new(page, limit, total);
    let parents = orang_tua::list(&state.db.pg, search, limit, pagination.offset()).await?;

    let ids: Vec<Uuid> = parents.iter().map(|p| p.id).collect();
    let mut by_parent: HashMap<Uuid, Vec<LinkedChild>> = HashMap::new();
    for child in orang_tua::children_of_many(&state.db.pg, &ids).await? {
        by_parent.entry(child.orang_tua_id).or_default().push(child);
    }

    let data = parents
        .into_iter()
        .map(|p| {
            let children = by_parent.remove(&p.id).unwrap_or_default();
            OrangTuaView::new(p, children)
        })
        .collect();

    Ok(Json(Paged { data, pagination }))
}

/// GET /api/admin/orangtua/{id}
async fn get_orang_tua(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<OrangTuaView>> {
    Ok(Json(load_view(&state, id).await?))
}

#[derive(Serialize)]
struct CreatedOrangTua {
    #[serde(rename = "orangTua")]
    orang_tua: OrangTuaView,
    credentials: serde_json::Value,
}

/// POST /api/admin/orangtua
///
/// With `siswaId` the parent gets the child's NIS as username and the child's
/// birth date (DDMMYYYY) as password, and starts active only if the child is
/// AKTIF. Without a child the username must be given and a random password is
/// generated.
async fn create_orang_tua(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<OrangTuaRequest>,
) -> SimtaqResult<(StatusCode, Json<CreatedOrangTua>)> {
    validate_request(&body)?;
    validate_phone(body.no_telepon.as_deref())?;

    let child = match body.siswa_id {
        Some(siswa_id) => Some(
            siswa::find_by_id(&state.db.pg, siswa_id)
                .await?
                .ok_or_else(|| SimtaqError::not_found("Siswa"))?,
        ),
        None => None,
    };

    let (username, password, is_active) = match &child {
        Some(child) => (
            child.nis.clone(),
            child
                .tanggal_lahir
                .map(credentials::parent_password)
                .unwrap_or_else(credentials::mixed_password),
            child.status_siswa == StatusSiswa::Aktif,
        ),
        None => {
            let username = non_blank(&body.username)
                .ok_or_else(|| SimtaqError::validation("Username wajib diisi jika belum ada anak yang dihubungkan"))?;
            (username.to_string(), credentials::mixed_password(), body.is_active.unwrap_or(true))
        }
    };
    let email = non_blank(&body.email)
        .map(str::to_string)
        .unwrap_or_else(|| credentials::wali_email(&body.name, &username));
    let hash = auth::hash_password_async(password.clone()).await?;

    let mut tx = state.db.pg.begin().await?;
    if users::username_taken(&mut *tx, &username, Role::OrangTua).await? {
        return Err(SimtaqError::already_exists("Akun orang tua dengan username ini"));
    }

    let user = users::create_user(
        &mut *tx,
        users::NewUser {
            id: generate_id(),
            username: &username,
            name: body.name.trim(),
            email: Some(email.as_str()).filter(|e| !e.is_empty()),
            password_hash: &hash,
            role: Role::OrangTua,
            is_active,
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "Akun orang tua"))?;

    let created = orang_tua::create(
        &mut *tx,
        generate_id(),
        user.id,
        orang_tua::OrangTuaFields {
            no_telepon: non_blank(&body.no_telepon),
            pekerjaan: non_blank(&body.pekerjaan),
            alamat: non_blank(&body.alamat),
            jenis_kelamin: body.jenis_kelamin,
        },
    )
    .await?;
    if let Some(child) = &child {
        orang_tua::link(&mut *tx, created.id, child.id, non_blank(&body.hubungan)).await?;
    }

    let entry = activity::by(&ctx, &client, ActivityAction::AdminTambahUser, "Menambahkan orang tua")
        .description(format!("{} ({username})", user.name))
        .target(user.id, Role::OrangTua, user.name.clone())
        .metadata(serde_json::json!({ "siswaId": body.siswa_id }));
    activity_logs::insert(&mut *tx, &entry).await?;
    tx.commit().await?;
    invalidate_stats(&state);

    let view = load_view(&state, created.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedOrangTua {
            orang_tua: view,
            credentials: serde_json::json!({ "username": username, "password": password }),
        }),
    ))
}

/// PUT /api/admin/orangtua/{id}
async fn update_orang_tua(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<OrangTuaRequest>,
) -> SimtaqResult<Json<OrangTuaView>> {
    validate_request(&body)?;
    validate_phone(body.no_telepon.as_deref())?;

    let mut tx = state.db.pg.begin().await?;
    let existing = orang_tua::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;
    let user = users::update_profile(
        &mut *tx,
        existing.user_id,
        Some(body.name.trim()),
        non_blank(&body.email),
    )
    .await?;
    orang_tua::update(
        &mut *tx,
        id,
        orang_tua::OrangTuaFields {
            no_telepon: non_blank(&body.no_telepon),
            pekerjaan: non_blank(&body.pekerjaan),
            alamat: non_blank(&body.alamat),
            jenis_kelamin: body.jenis_kelamin,
        },
    )
    .await?;
    if let Some(is_active) = body.is_active {
        users::set_active(&mut *tx, user.id, is_active).await?;
    }
    tx.commit().await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahUser, "Mengubah data orang tua")
            .target(user.id, Role::OrangTua, user.name.clone())
            .metadata(serde_json::json!({ "isActive": body.is_active })),
    );

    Ok(Json(load_view(&state, id).await?))
}

/// DELETE /api/admin/orangtua/{id}
async fn delete_orang_tua(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let detail = orang_tua::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;

    users::delete_user(&state.db.pg, detail.user_id).await?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminHapusUser, "Menghapus orang tua")
            .target(detail.user_id, Role::OrangTua, detail.name.clone()),
    );

    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/admin/orangtua/{id}/reset-password: returns the new random password once.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let detail = orang_tua::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;

    let password = credentials::mixed_password();
    let hash = auth::hash_password_async(password.clone()).await?;
    users::update_password(&state.db.pg, detail.user_id, &hash).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminResetPassword, "Reset password orang tua")
            .target(detail.user_id, Role::OrangTua, detail.name.clone()),
    );
    tracing::info!(admin_id = %ctx.user_id, orang_tua_id = %id, "Parent password reset");

    Ok(Json(serde_json::json!({
        "success": true,
        "username": detail.username,
        "password": password,
    })))
}

/// POST /api/admin/orangtua/{id}/siswa
///
/// Linking re-evaluates the parents' active flag against the child's status.
async fn link_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<LinkSiswaRequest>,
) -> SimtaqResult<Json<OrangTuaView>> {
    let child = siswa::find_detail(&state.db.pg, body.siswa_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;

    let mut tx = state.db.pg.begin().await?;
    let parent = orang_tua::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;
    orang_tua::link(&mut *tx, parent.id, child.id, non_blank(&body.hubungan)).await?;
    orang_tua::sync_parent_activity(&mut *tx, child.id).await?;
    tx.commit().await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahUser, "Menghubungkan orang tua dengan siswa")
            .description(format!("{} (NIS {})", child.name, child.nis))
            .metadata(serde_json::json!({ "orangTuaId": id, "siswaId": child.id })),
    );

    Ok(Json(load_view(&state, id).await?))
}

/// DELETE /api/admin/orangtua/{id}/siswa/{siswa_id}
async fn unlink_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path((id, siswa_id)): Path<(Uuid, Uuid)>,
) -> SimtaqResult<Json<OrangTuaView>> {
    if !orang_tua::unlink(&state.db.pg, id, siswa_id).await? {
        return Err(SimtaqError::not_found("Hubungan orang tua dan siswa"));
    }

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahUser, "Melepas hubungan orang tua dengan siswa")
            .metadata(serde_json::json!({ "orangTuaId": id, "siswaId": siswa_id })),
    );

    Ok(Json(load_view(&state, id).await?))
}
