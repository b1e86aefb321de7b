//! Domain models shared between the database layer and the HTTP layer.

pub mod academic;
pub mod activity;
pub mod certificate;
pub mod hafalan;
pub mod laporan;
pub mod pengumuman;
pub mod people;
pub mod presensi;
pub mod tasmi;
pub mod user;

use serde::Serialize;

/// Pagination block returned next to paged lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_count + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_previous_page);
        assert_eq!(p.offset(), 10);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next_page);

        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_previous_page);
    }
}
