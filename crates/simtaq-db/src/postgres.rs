//! PostgreSQL helpers.

use sqlx::PgPool;

/// Health check: verify the database answers.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Escape `%`, `_` and `\` and wrap in wildcards for an `ILIKE` search.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" budi "), "%budi%");
        assert_eq!(like_pattern("50%_a"), "%50\\%\\_a%");
    }
}
