//! Administrator area: master data, validation, announcements, logs,
//! dashboard, certificates, reports and the tasmi' overview. Every route
//! requires an ADMIN session.

mod activity_logs;
mod certificates;
mod dashboard;
mod guru;
mod kelas;
mod laporan;
mod orang_tua;
mod pengumuman;
mod siswa;
mod tahun_ajaran;
mod tasmi;

use axum::{middleware::from_fn, Router};
use std::sync::Arc;

pub(crate) use super::{PageQuery, Paged};
use crate::{
    cache,
    middleware::{auth_middleware, require_admin},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(siswa::router())
        .merge(guru::router())
        .merge(orang_tua::router())
        .merge(kelas::router())
        .merge(tahun_ajaran::router())
        .merge(pengumuman::router())
        .merge(activity_logs::router())
        .merge(dashboard::router())
        .merge(certificates::router())
        .merge(laporan::router())
        .merge(tasmi::router())
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn(auth_middleware))
}

/// Drop cached dashboard aggregates after a change to master data.
pub(crate) fn invalidate_stats(state: &AppState) {
    state.cache.invalidate(cache::ADMIN_STATS);
    state.cache.invalidate_prefix(cache::GURU_STATS);
}

/// Treat blank strings from forms as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
