//! Teacher area. Every route requires a GURU session; the teacher row is
//! resolved from the session user on each request.

mod kelas;
mod laporan;
mod penilaian;
mod presensi;
mod profile;
mod tasmi;

use axum::{middleware::from_fn, Router};
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    models::{pengumuman::PushPayload, people::Guru},
};
use simtaq_db::repository::{guru, orang_tua};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    middleware::{auth_middleware, require_guru, AuthContext},
    push::Audience,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(kelas::router())
        .merge(laporan::router())
        .merge(penilaian::router())
        .merge(presensi::router())
        .merge(tasmi::router())
        .merge(profile::router())
        .route_layer(from_fn(require_guru))
        .route_layer(from_fn(auth_middleware))
}

/// The teacher row behind the session.
pub(crate) async fn current_guru(state: &AppState, ctx: &AuthContext) -> SimtaqResult<Guru> {
    guru::find_by_user_id(&state.db.pg, ctx.user_id)
        .await?
        .ok_or_else(|| SimtaqError::not_found("Data guru"))
}

/// Fail with 403 unless the teacher is assigned to the class.
pub(crate) async fn ensure_teaches(state: &AppState, guru_id: Uuid, kelas_id: Option<Uuid>) -> SimtaqResult<()> {
    let Some(kelas_id) = kelas_id else {
        return Err(SimtaqError::Forbidden);
    };
    if !guru::teaches_kelas(&state.db.pg, guru_id, kelas_id).await? {
        return Err(SimtaqError::Forbidden);
    }
    Ok(())
}

/// Push to a student and, with their own link, to the student's parents.
pub(crate) async fn notify_student_and_parents(
    state: &AppState,
    siswa_user_id: Uuid,
    siswa_id: Uuid,
    kind: &'static str,
    title: &str,
    body: &str,
    (siswa_url, parent_url): (&str, &str),
) {
    state.push.spawn_notify(
        Audience::Users(vec![siswa_user_id]),
        kind,
        PushPayload::new(title, body, siswa_url),
    );

    match orang_tua::parent_user_ids(&state.db.pg, siswa_id).await {
        Ok(parents) if !parents.is_empty() => state.push.spawn_notify(
            Audience::Users(parents),
            kind,
            PushPayload::new(title, body, parent_url),
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, siswa_id = %siswa_id, "Parent lookup for notification failed"),
    }
}
