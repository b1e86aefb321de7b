//! API route modules.

pub mod admin;
pub mod audio;
pub mod auth;
pub mod guru;
pub mod health;
pub(crate) mod laporan;
pub mod orangtua;
pub mod shared;
pub mod siswa;
pub mod uploads;

use serde::{Deserialize, Serialize};
use simtaq_common::models::Pagination;

/// `?page=&limit=` for paged listings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// A page of rows with its pagination block.
#[derive(Serialize)]
pub(crate) struct Paged<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
