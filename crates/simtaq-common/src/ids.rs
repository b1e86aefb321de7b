//! Row identifiers.
//!
//! Every table keys on a UUID v7 so ids sort by creation time and can be
//! generated before the insert (needed when several rows are written in one
//! transaction and reference each other).

use uuid::Uuid;

/// Generate a new time-ordered id.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_time_sortable() {
        let id1 = generate_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = generate_id();
        assert!(id1 < id2);
    }
}
