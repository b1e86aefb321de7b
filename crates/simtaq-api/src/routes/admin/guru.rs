//! Teacher administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    credentials,
    error::{map_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        academic::{AssignGuruRequest, Kelas},
        activity::ActivityAction,
        people::{GuruDetail, GuruRequest},
        user::Role,
    },
    validation::{validate_phone, validate_request},
};
use simtaq_db::repository::{activity_logs, guru, users};
use std::sync::Arc;
use uuid::Uuid;

use super::{invalidate_stats, kelas::assign_guru_to_kelas, non_blank};
use crate::{
    activity,
    auth,
    middleware::{AuthContext, ClientInfo},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/guru", get(list_guru).post(create_guru))
        .route(
            "/admin/guru/{id}",
            get(get_guru).put(update_guru).delete(delete_guru),
        )
        .route("/admin/guru/{id}/kelas", post(assign_kelas))
}

#[derive(Debug, Deserialize)]
struct GuruQuery {
    search: Option<String>,
}

/// GET /api/admin/guru?search=
async fn list_guru(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GuruQuery>,
) -> SimtaqResult<Json<Vec<GuruDetail>>> {
    Ok(Json(guru::list(&state.db.pg, query.search.as_deref()).await?))
}

#[derive(Serialize)]
struct GuruWithKelas {
    #[serde(flatten)]
    guru: GuruDetail,
    kelas: Vec<Kelas>,
}

/// GET /api/admin/guru/{id}
async fn get_guru(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<GuruWithKelas>> {
    let detail = guru::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;
    let kelas = guru::kelas_of(&state.db.pg, id).await?;
    Ok(Json(GuruWithKelas { guru: detail, kelas }))
}

#[derive(Serialize)]
struct CreatedGuru {
    guru: GuruDetail,
    credentials: serde_json::Value,
}

/// POST /api/admin/guru
///
/// Username is the next `G<nnn>`; the default password is the birth date
/// unless one is supplied.
async fn create_guru(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<GuruRequest>,
) -> SimtaqResult<(StatusCode, Json<CreatedGuru>)> {
    validate_request(&body)?;
    validate_phone(body.no_telepon.as_deref())?;

    let password = match (non_blank(&body.password), body.tanggal_lahir) {
        (Some(password), _) => password.to_string(),
        (None, Some(tanggal_lahir)) => credentials::student_password(tanggal_lahir),
        (None, None) => {
            return Err(SimtaqError::validation(
                "Tanggal lahir wajib diisi jika password tidak ditentukan",
            ));
        }
    };
    let hash = auth::hash_password_async(password.clone()).await?;
    let email = non_blank(&body.email)
        .map(str::to_string)
        .unwrap_or_else(|| credentials::guru_email(&body.name));

    let mut tx = state.db.pg.begin().await?;

    let existing = users::guru_usernames(&mut *tx).await?;
    let username = credentials::next_guru_username(existing.iter().map(String::as_str));

    let user = users::create_user(
        &mut *tx,
        users::NewUser {
            id: generate_id(),
            username: &username,
            name: body.name.trim(),
            email: Some(email.as_str()).filter(|e| !e.is_empty()),
            password_hash: &hash,
            role: Role::Guru,
            is_active: body.is_active.unwrap_or(true),
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "Username guru"))?;

    let created = guru::create(
        &mut *tx,
        generate_id(),
        user.id,
        guru::GuruFields {
            nip: non_blank(&body.nip),
            jenis_kelamin: body.jenis_kelamin,
            tanggal_lahir: body.tanggal_lahir,
            no_telepon: non_blank(&body.no_telepon),
            alamat: non_blank(&body.alamat),
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "NIP"))?;

    let entry = activity::by(&ctx, &client, ActivityAction::AdminTambahUser, "Menambahkan guru baru")
        .description(format!("{} ({username})", user.name))
        .target(user.id, Role::Guru, user.name.clone());
    activity_logs::insert(&mut *tx, &entry).await?;

    tx.commit().await?;
    invalidate_stats(&state);

    let detail = guru::find_detail(&state.db.pg, created.id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;
    tracing::info!(admin_id = %ctx.user_id, guru_id = %created.id, %username, "Teacher created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedGuru {
            guru: detail,
            credentials: serde_json::json!({ "username": username, "password": password }),
        }),
    ))
}

/// PUT /api/admin/guru/{id}
async fn update_guru(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<GuruRequest>,
) -> SimtaqResult<Json<GuruDetail>> {
    validate_request(&body)?;
    validate_phone(body.no_telepon.as_deref())?;

    let existing = guru::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;
    let new_hash = match non_blank(&body.password) {
        Some(password) => Some(auth::hash_password_async(password.to_string()).await?),
        None => None,
    };

    let mut tx = state.db.pg.begin().await?;
    let user = users::update_profile(
        &mut *tx,
        existing.user_id,
        Some(body.name.trim()),
        non_blank(&body.email),
    )
    .await?;
    guru::update(
        &mut *tx,
        id,
        guru::GuruFields {
            nip: non_blank(&body.nip),
            jenis_kelamin: body.jenis_kelamin,
            tanggal_lahir: body.tanggal_lahir,
            no_telepon: non_blank(&body.no_telepon),
            alamat: non_blank(&body.alamat),
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "NIP"))?;
    if let Some(is_active) = body.is_active {
        users::set_active(&mut *tx, user.id, is_active).await?;
    }
    if let Some(hash) = &new_hash {
        users::update_password(&mut *tx, user.id, hash).await?;
    }
    tx.commit().await?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahUser, "Mengubah data guru")
            .target(user.id, Role::Guru, user.name.clone())
            .metadata(serde_json::json!({ "passwordChanged": new_hash.is_some() })),
    );

    let detail = guru::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;
    Ok(Json(detail))
}

/// DELETE /api/admin/guru/{id}
async fn delete_guru(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let detail = guru::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Guru"))?;

    users::delete_user(&state.db.pg, detail.user_id).await?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminHapusUser, "Menghapus guru")
            .description(format!("{} ({})", detail.name, detail.username))
            .target(detail.user_id, Role::Guru, detail.name.clone()),
    );
    tracing::info!(admin_id = %ctx.user_id, guru_id = %id, "Teacher deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignKelasRequest {
    kelas_id: Uuid,
    peran: Option<simtaq_common::models::academic::PeranGuru>,
}

/// POST /api/admin/guru/{id}/kelas: same as assigning from the class side.
async fn assign_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignKelasRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let request = AssignGuruRequest {
        guru_id: id,
        peran: body.peran,
    };
    assign_guru_to_kelas(&state, &ctx, &client, body.kelas_id, request).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
