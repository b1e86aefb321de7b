//! Student administration.
//!
//! Creating a student creates the login account, the profile and (optionally)
//! the parent account in one transaction. Life-cycle and validation changes
//! cascade to the student and parent accounts inside a transaction too.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    credentials,
    error::{map_unique_violation, SimtaqError, SimtaqResult},
    ids::generate_id,
    models::{
        activity::ActivityAction,
        people::{CreateSiswaRequest, SiswaDetail, StatusSiswa, UpdateSiswaRequest, ValidationStatus},
        user::Role,
        Pagination,
    },
    validation::{page_params, validate_phone, validate_request, DIGITS_RE},
};
use simtaq_db::repository::{activity_logs, kelas, orang_tua, siswa, users};
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
        .route("/admin/siswa", get(list_siswa).post(create_siswa))
        .route(
            "/admin/siswa/{id}",
            get(get_siswa).put(update_siswa).delete(delete_siswa),
        )
        .route("/admin/siswa/{id}/status", patch(update_status))
        .route("/admin/siswa/{id}/kelas", patch(update_kelas))
        .route("/admin/siswa/{id}/validate", post(validate_siswa))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiswaListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<ValidationStatus>,
    kelas_id: Option<Uuid>,
    status_siswa: Option<StatusSiswa>,
    search: Option<String>,
}

/// GET /api/admin/siswa
async fn list_siswa(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiswaListQuery>,
) -> SimtaqResult<Json<Paged<SiswaDetail>>> {
    let (page, limit) = page_params(query.page, query.limit, 20);
    let filter = siswa::SiswaFilter {
        status: query.status,
        kelas_id: query.kelas_id,
        status_siswa: query.status_siswa,
        search: query.search,
    };

    let total = siswa::count(&state.db.pg, &filter).await?;
    let pagination = Pagination::new(page, limit, total);
    let data = siswa::list(&state.db.pg, &filter, limit, pagination.offset()).await?;

    Ok(Json(Paged { data, pagination }))
}

#[derive(Serialize)]
struct Credential {
    username: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedCredentials {
    siswa: Credential,
    #[serde(skip_serializing_if = "Option::is_none")]
    orang_tua: Option<Credential>,
}

#[derive(Serialize)]
struct CreatedSiswa {
    siswa: SiswaDetail,
    credentials: GeneratedCredentials,
}

fn check_digits(field: &str, value: &str) -> SimtaqResult<()> {
    if !DIGITS_RE.is_match(value) {
        return Err(SimtaqError::validation(format!("{field} harus berupa angka")));
    }
    Ok(())
}

/// POST /api/admin/siswa
///
/// Username is the NIS; the default password is the birth date. When `wali`
/// is given a parent account is created (username NIS, password DDMMYYYY);
/// `orangTuaId` links an existing parent instead.
async fn create_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<CreateSiswaRequest>,
) -> SimtaqResult<(StatusCode, Json<CreatedSiswa>)> {
    validate_request(&body)?;
    let nis = body.nis.trim();
    check_digits("NIS", nis)?;
    if let Some(nisn) = non_blank(&body.nisn) {
        check_digits("NISN", nisn)?;
    }
    validate_phone(body.no_telepon.as_deref())?;
    if let Some(wali) = &body.wali {
        validate_phone(wali.no_telepon.as_deref())?;
    }
    if let Some(kelas_id) = body.kelas_id {
        kelas::find_by_id(&state.db.pg, kelas_id)
            .await?
            .ok_or_else(|| SimtaqError::not_found("Kelas"))?;
    }

    let siswa_password = credentials::student_password(body.tanggal_lahir);
    let siswa_hash = auth::hash_password_async(siswa_password.clone()).await?;
    let wali = match (&body.wali, body.orang_tua_id) {
        (Some(wali), None) => {
            let password = credentials::parent_password(body.tanggal_lahir);
            let hash = auth::hash_password_async(password.clone()).await?;
            Some((wali, password, hash))
        }
        _ => None,
    };

    let mut tx = state.db.pg.begin().await?;

    if siswa::nis_exists(&mut *tx, nis).await? {
        return Err(SimtaqError::already_exists("NIS"));
    }
    if users::username_taken(&mut *tx, nis, Role::Siswa).await? {
        return Err(SimtaqError::already_exists("Username"));
    }

    let user = users::create_user(
        &mut *tx,
        users::NewUser {
            id: generate_id(),
            username: nis,
            name: body.name.trim(),
            email: non_blank(&body.email),
            password_hash: &siswa_hash,
            role: Role::Siswa,
            is_active: true,
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "Username"))?;

    let created = siswa::create(
        &mut *tx,
        siswa::NewSiswa {
            id: generate_id(),
            user_id: user.id,
            nis,
            nisn: non_blank(&body.nisn),
            jenis_kelamin: body.jenis_kelamin,
            tanggal_lahir: body.tanggal_lahir,
            alamat: non_blank(&body.alamat),
            no_telepon: non_blank(&body.no_telepon),
            kelas_id: body.kelas_id,
            status: ValidationStatus::Approved,
        },
    )
    .await
    .map_err(|e| map_unique_violation(e, "NIS"))?;

    let mut parent_credential = None;
    if let Some(orang_tua_id) = body.orang_tua_id {
        let parent = orang_tua::find_by_id(&mut *tx, orang_tua_id)
            .await?
            .ok_or_else(|| SimtaqError::not_found("Orang tua"))?;
        let hubungan = body.wali.as_ref().and_then(|w| non_blank(&w.hubungan));
        orang_tua::link(&mut *tx, parent.id, created.id, hubungan).await?;
    } else if let Some((wali, password, hash)) = wali {
        if users::username_taken(&mut *tx, nis, Role::OrangTua).await? {
            return Err(SimtaqError::already_exists("Akun orang tua untuk NIS ini"));
        }
        let email = credentials::wali_email(&wali.name, nis);
        let parent_user = users::create_user(
            &mut *tx,
            users::NewUser {
                id: generate_id(),
                username: nis,
                name: wali.name.trim(),
                email: Some(email.as_str()).filter(|e| !e.is_empty()),
                password_hash: &hash,
                role: Role::OrangTua,
                is_active: true,
            },
        )
        .await
        .map_err(|e| map_unique_violation(e, "Akun orang tua"))?;
        let parent = orang_tua::create(
            &mut *tx,
            generate_id(),
            parent_user.id,
            orang_tua::OrangTuaFields {
                no_telepon: non_blank(&wali.no_telepon),
                pekerjaan: non_blank(&wali.pekerjaan),
                alamat: non_blank(&wali.alamat),
                jenis_kelamin: wali.jenis_kelamin,
            },
        )
        .await?;
        orang_tua::link(&mut *tx, parent.id, created.id, non_blank(&wali.hubungan)).await?;
        parent_credential = Some(Credential {
            username: nis.to_string(),
            password,
        });
    }

    let entry = activity::by(&ctx, &client, ActivityAction::AdminTambahSiswa, "Menambahkan siswa baru")
        .description(format!("{} (NIS {nis})", user.name))
        .target(user.id, Role::Siswa, user.name.clone())
        .metadata(serde_json::json!({
            "siswaId": created.id,
            "parentCreated": parent_credential.is_some(),
            "parentLinked": body.orang_tua_id,
        }));
    activity_logs::insert(&mut *tx, &entry).await?;

    tx.commit().await?;
    invalidate_stats(&state);

    let detail = siswa::find_detail(&state.db.pg, created.id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;

    tracing::info!(admin_id = %ctx.user_id, siswa_id = %created.id, "Student created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedSiswa {
            siswa: detail,
            credentials: GeneratedCredentials {
                siswa: Credential {
                    username: nis.to_string(),
                    password: siswa_password,
                },
                orang_tua: parent_credential,
            },
        }),
    ))
}

/// GET /api/admin/siswa/{id}
async fn get_siswa(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<SiswaDetail>> {
    siswa::find_detail(&state.db.pg, id)
        .await?
        .map(Json)
        .ok_or_else(|| SimtaqError::not_found("Siswa"))
}

/// PUT /api/admin/siswa/{id}
async fn update_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSiswaRequest>,
) -> SimtaqResult<Json<SiswaDetail>> {
    validate_request(&body)?;
    if let Some(nisn) = non_blank(&body.nisn) {
        check_digits("NISN", nisn)?;
    }
    validate_phone(body.no_telepon.as_deref())?;

    let mut tx = state.db.pg.begin().await?;
    let existing = siswa::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;

    let user = users::update_profile(
        &mut *tx,
        existing.user_id,
        non_blank(&body.name),
        non_blank(&body.email),
    )
    .await?;
    siswa::update(
        &mut *tx,
        id,
        siswa::SiswaUpdate {
            nisn: non_blank(&body.nisn),
            jenis_kelamin: body.jenis_kelamin,
            tanggal_lahir: body.tanggal_lahir,
            alamat: non_blank(&body.alamat),
            no_telepon: non_blank(&body.no_telepon),
        },
    )
    .await?;
    tx.commit().await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahSiswa, "Mengubah data siswa")
            .target(user.id, Role::Siswa, user.name.clone()),
    );

    let detail = siswa::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    Ok(Json(detail))
}

/// DELETE /api/admin/siswa/{id}
///
/// Removes the login account; the profile, links, deposits and grades cascade.
async fn delete_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let detail = siswa::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;

    users::delete_user(&state.db.pg, detail.user_id).await?;
    invalidate_stats(&state);

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminHapusSiswa, "Menghapus siswa")
            .description(format!("{} (NIS {})", detail.name, detail.nis))
            .target(detail.user_id, Role::Siswa, detail.name.clone()),
    );
    tracing::info!(admin_id = %ctx.user_id, siswa_id = %id, "Student deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    status_siswa: StatusSiswa,
    alasan: Option<String>,
}

/// PATCH /api/admin/siswa/{id}/status
///
/// The student account follows the new status; every linked parent stays
/// active only while they still have an AKTIF child.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let mut tx = state.db.pg.begin().await?;

    let before = siswa::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    let user = users::find_by_id(&mut *tx, before.user_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Akun siswa"))?;

    let updated = siswa::set_status_siswa(&mut *tx, id, body.status_siswa).await?;
    users::set_active(&mut *tx, user.id, body.status_siswa == StatusSiswa::Aktif).await?;
    let parents_updated = orang_tua::sync_parent_activity(&mut *tx, id).await?;

    let mut entry = activity::by(
        &ctx,
        &client,
        ActivityAction::SiswaUpdateStatus,
        format!("Mengubah status siswa menjadi {}", body.status_siswa.as_str()),
    )
    .target(user.id, Role::Siswa, user.name.clone())
    .metadata(serde_json::json!({
        "from": before.status_siswa,
        "to": body.status_siswa,
        "parentsUpdated": parents_updated,
    }));
    if let Some(alasan) = non_blank(&body.alasan) {
        entry = entry.description(alasan);
    }
    activity_logs::insert(&mut *tx, &entry).await?;

    tx.commit().await?;
    invalidate_stats(&state);

    tracing::info!(
        siswa_id = %id,
        from = before.status_siswa.as_str(),
        to = body.status_siswa.as_str(),
        parents_updated,
        "Student status changed"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "siswa": updated,
        "parentsUpdated": parents_updated,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KelasRequest {
    kelas_id: Option<Uuid>,
}

/// PATCH /api/admin/siswa/{id}/kelas: move to a class, or `null` to unassign.
async fn update_kelas(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<KelasRequest>,
) -> SimtaqResult<Json<SiswaDetail>> {
    if let Some(kelas_id) = body.kelas_id {
        let target = kelas::find_by_id(&state.db.pg, kelas_id)
            .await?
            .ok_or_else(|| SimtaqError::not_found("Kelas"))?;
        if !target.is_active {
            return Err(SimtaqError::validation("Kelas tidak aktif"));
        }
    }

    siswa::set_kelas(&state.db.pg, id, body.kelas_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    invalidate_stats(&state);

    let detail = siswa::find_detail(&state.db.pg, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::AdminUbahSiswa, "Memindahkan kelas siswa")
            .description(detail.kelas_nama.clone().unwrap_or_else(|| "Tanpa kelas".into()))
            .target(detail.user_id, Role::Siswa, detail.name.clone()),
    );

    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    status: ValidationStatus,
    catatan: Option<String>,
}

/// POST /api/admin/siswa/{id}/validate
///
/// Approval activates the student and every linked parent; rejection
/// deactivates the student.
async fn validate_siswa(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(body): Json<ValidateRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    let approved = match body.status {
        ValidationStatus::Approved => true,
        ValidationStatus::Rejected => false,
        ValidationStatus::Pending => {
            return Err(SimtaqError::validation("Status validasi harus approved atau rejected"));
        }
    };

    let mut tx = state.db.pg.begin().await?;
    let existing = siswa::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Siswa"))?;
    let user = users::find_by_id(&mut *tx, existing.user_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Akun siswa"))?;

    let updated = siswa::set_validation_status(&mut *tx, id, body.status).await?;
    users::set_active(&mut *tx, user.id, approved).await?;
    let parents_activated = if approved {
        orang_tua::activate_parents(&mut *tx, id).await?
    } else {
        0
    };

    let title = if approved { "Menyetujui siswa" } else { "Menolak siswa" };
    let mut entry = activity::by(&ctx, &client, ActivityAction::AdminValidasiSiswa, title)
        .target(user.id, Role::Siswa, user.name.clone())
        .metadata(serde_json::json!({ "status": body.status, "parentsActivated": parents_activated }));
    if let Some(catatan) = non_blank(&body.catatan) {
        entry = entry.description(catatan);
    }
    activity_logs::insert(&mut *tx, &entry).await?;

    tx.commit().await?;
    invalidate_stats(&state);

    Ok(Json(serde_json::json!({
        "success": true,
        "siswa": updated,
        "parentsActivated": parents_activated,
    })))
}
