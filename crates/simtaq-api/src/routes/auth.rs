//! Authentication routes: login, logout, session info, password management.

use axum::{
    extract::{Query, State},
    http::header,
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    credentials,
    error::{SimtaqError, SimtaqResult},
    models::{
        activity::ActivityAction,
        user::{ChangePasswordRequest, LoginRequest, ResetPasswordRequest, Role, User, UserResponse},
    },
    status::{check_user_access, AccessCheck, AccountFacts},
    validation::validate_request,
};
use simtaq_db::repository::{orang_tua, rate_limits, siswa, users};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    activity,
    auth,
    middleware::{auth_middleware, session_token, AuthContext, ClientInfo},
    AppState,
};

/// Auth router.
pub fn router() -> Router<Arc<AppState>> {
    let authenticated = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/recovery-code", post(create_recovery_code))
        .route_layer(from_fn(auth_middleware));

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/check-status", get(check_status))
        .merge(authenticated)
}

/// `Set-Cookie` value carrying the session token.
pub fn session_cookie(token: &str) -> String {
    let cfg = &simtaq_common::config::get().auth;
    let secure = if cfg.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        cfg.cookie_name, cfg.session_ttl_secs
    )
}

fn clear_session_cookie() -> String {
    let cfg = &simtaq_common::config::get().auth;
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", cfg.cookie_name)
}

/// Facts the access rules need beyond the user row.
pub(crate) async fn account_facts(pool: &PgPool, user: &User) -> SimtaqResult<AccountFacts> {
    let mut facts = AccountFacts {
        role: user.role,
        is_active: user.is_active,
        status_siswa: None,
        has_active_child: false,
    };
    match user.role {
        Role::Siswa => {
            facts.status_siswa = siswa::find_by_user_id(pool, user.id).await?.map(|s| s.status_siswa);
        }
        Role::OrangTua => {
            facts.has_active_child = orang_tua::has_active_child(pool, user.id).await?;
        }
        Role::Admin | Role::Guru => {}
    }
    Ok(facts)
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserResponse,
    token: String,
}

/// POST /api/auth/login
///
/// Students and their parents share a username (the NIS), so every account
/// with that username is tried and the one whose password verifies wins.
async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(body): Json<LoginRequest>,
) -> SimtaqResult<impl IntoResponse> {
    validate_request(&body)?;

    let candidates = match body.role {
        Some(role) => users::find_by_username_and_role(&state.db.pg, &body.username, role)
            .await?
            .into_iter()
            .collect(),
        None => users::find_by_username(&state.db.pg, &body.username).await?,
    };

    let mut matched = None;
    for candidate in candidates {
        if auth::verify_password_async(body.password.clone(), candidate.password_hash.clone()).await? {
            matched = Some(candidate);
            break;
        }
    }
    let user = matched.ok_or(SimtaqError::InvalidCredentials)?;

    let access = check_user_access(account_facts(&state.db.pg, &user).await?);
    if !access.allowed {
        tracing::info!(user_id = %user.id, role = %user.role, "Login refused for inactive account");
        return Err(SimtaqError::AccountInactive {
            reason: access.reason.unwrap_or_else(|| "Akun tidak aktif".into()),
        });
    }

    let config = simtaq_common::config::get();
    let token = auth::generate_session_token(&user, &config.auth.jwt_secret, config.auth.session_ttl_secs)
        .map_err(|e| SimtaqError::Internal(e.into()))?;

    activity::record(
        &state.db.pg,
        simtaq_common::models::activity::NewActivity::new(
            user.id,
            user.role,
            ActivityAction::login_for(user.role),
            format!("Login sebagai {}", user.role.label()),
        )
        .actor_name(user.name.clone())
        .client(client.ip.clone(), client.user_agent.clone()),
    );

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(LoginResponse {
            user: user.into(),
            token,
        }),
    ))
}

/// POST /api/auth/logout
///
/// Always clears the cookie; logs the logout when the session was still valid.
async fn logout(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let config = simtaq_common::config::get();
    let claims = session_token(&headers).and_then(|t| auth::validate_token(&t, &config.auth.jwt_secret).ok());

    if let Some(claims) = claims {
        if let Ok(user_id) = claims.user_id() {
            let ctx = AuthContext {
                user_id,
                username: claims.username,
                name: claims.name,
                role: claims.role,
            };
            activity::record(
                &state.db.pg,
                activity::by(&ctx, &client, ActivityAction::logout_for(ctx.role), "Logout"),
            );
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "message": "Berhasil logout" })),
    )
}

/// GET /api/auth/me
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> SimtaqResult<Json<UserResponse>> {
    let user = users::find_by_id(&state.db.pg, ctx.user_id)
        .await?
        .ok_or(SimtaqError::Unauthorized)?;
    Ok(Json(user.into()))
}

/// POST /api/auth/change-password
async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
    Json(body): Json<ChangePasswordRequest>,
) -> SimtaqResult<Json<serde_json::Value>> {
    validate_request(&body)?;
    if body.current_password == body.new_password {
        return Err(SimtaqError::validation("Password baru harus berbeda dari password lama"));
    }

    let user = users::find_by_id(&state.db.pg, ctx.user_id)
        .await?
        .ok_or(SimtaqError::Unauthorized)?;
    if !auth::verify_password_async(body.current_password, user.password_hash).await? {
        return Err(SimtaqError::validation("Password lama salah"));
    }

    let hash = auth::hash_password_async(body.new_password).await?;
    users::update_password(&state.db.pg, ctx.user_id, &hash).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::UserUbahPassword, "Mengubah password"),
    );
    tracing::info!(user_id = %ctx.user_id, "Password changed");

    Ok(Json(serde_json::json!({ "message": "Password berhasil diubah" })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecoveryCodeResponse {
    recovery_code: String,
    message: &'static str,
}

/// Generate a code, store its hash, return the raw code.
async fn rotate_recovery_code(pool: &PgPool, user_id: uuid::Uuid) -> SimtaqResult<String> {
    let code = credentials::recovery_code();
    let to_hash = code.clone();
    let hash = tokio::task::spawn_blocking(move || auth::hash_recovery_code(&to_hash))
        .await
        .map_err(SimtaqError::internal)?
        .map_err(SimtaqError::internal)?;
    users::set_recovery_code(pool, user_id, &hash).await?;
    Ok(code)
}

/// POST /api/auth/recovery-code
///
/// The raw code is shown once; only its hash is kept.
async fn create_recovery_code(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    client: ClientInfo,
) -> SimtaqResult<Json<RecoveryCodeResponse>> {
    let recovery_code = rotate_recovery_code(&state.db.pg, ctx.user_id).await?;

    activity::record(
        &state.db.pg,
        activity::by(&ctx, &client, ActivityAction::UserBuatKodePemulihan, "Membuat kode pemulihan"),
    );

    Ok(Json(RecoveryCodeResponse {
        recovery_code,
        message: "Simpan kode ini di tempat aman. Kode hanya ditampilkan sekali.",
    }))
}

fn rate_limited(left: Duration) -> SimtaqError {
    let secs = left.num_seconds().max(1);
    SimtaqError::RateLimited {
        minutes: (secs + 59) / 60,
        retry_after_ms: left.num_milliseconds().max(0) as u64,
    }
}

/// POST /api/auth/reset-password
///
/// Unknown users and wrong codes give the same answer. Failures count against
/// `reset-password:<ip>:<username>`.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(body): Json<ResetPasswordRequest>,
) -> SimtaqResult<Json<RecoveryCodeResponse>> {
    validate_request(&body)?;
    let pool = &state.db.pg;
    let config = &simtaq_common::config::get().auth;
    let key = format!(
        "reset-password:{}:{}",
        client.ip_or_unknown(),
        body.username.trim().to_lowercase()
    );

    if let Some(left) = rate_limits::find(pool, &key)
        .await?
        .and_then(|rl| rl.locked_for(Utc::now()))
    {
        return Err(rate_limited(left));
    }

    let user = users::find_by_username_and_role(pool, &body.username, body.role).await?;
    let verified = match &user {
        Some(u) => match u.recovery_code_hash.clone() {
            Some(hash) => {
                let code = body.recovery_code.clone();
                tokio::task::spawn_blocking(move || auth::verify_recovery_code(&code, &hash))
                    .await
                    .map_err(SimtaqError::internal)?
            }
            None => false,
        },
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        let rl = rate_limits::record_failure(
            pool,
            &key,
            config.reset_max_attempts,
            Duration::minutes(config.reset_lock_minutes),
        )
        .await?;
        tracing::warn!(key = %key, attempts = rl.attempts, "Password reset attempt failed");
        if let Some(left) = rl.locked_for(Utc::now()) {
            return Err(rate_limited(left));
        }
        return Err(SimtaqError::validation("Username atau kode pemulihan tidak valid"));
    };

    let hash = auth::hash_password_async(body.new_password).await?;
    users::update_password(pool, user.id, &hash).await?;
    let recovery_code = rotate_recovery_code(pool, user.id).await?;
    rate_limits::clear(pool, &key).await?;

    activity::record(
        pool,
        simtaq_common::models::activity::NewActivity::new(
            user.id,
            user.role,
            ActivityAction::UserResetPassword,
            "Reset password dengan kode pemulihan",
        )
        .actor_name(user.name.clone())
        .client(client.ip.clone(), client.user_agent.clone()),
    );
    tracing::info!(user_id = %user.id, "Password reset with recovery code");

    Ok(Json(RecoveryCodeResponse {
        recovery_code,
        message: "Password berhasil direset. Simpan kode pemulihan baru Anda.",
    }))
}

#[derive(Deserialize)]
struct CheckStatusQuery {
    username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountStatus {
    role: Role,
    name: String,
    #[serde(flatten)]
    access: AccessCheck,
}

/// GET /api/auth/check-status?username=
async fn check_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckStatusQuery>,
) -> SimtaqResult<Json<Vec<AccountStatus>>> {
    let username = query
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| SimtaqError::validation("Username wajib diisi"))?;

    let mut statuses = Vec::new();
    for user in users::find_by_username(&state.db.pg, &username).await? {
        let access = check_user_access(account_facts(&state.db.pg, &user).await?);
        statuses.push(AccountStatus {
            role: user.role,
            name: user.name,
            access,
        });
    }
    if statuses.is_empty() {
        return Err(SimtaqError::not_found("Akun"));
    }
    Ok(Json(statuses))
}
