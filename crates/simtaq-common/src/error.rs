//! Centralized error types for SIMTAQ.
//!
//! Every handler returns [`SimtaqResult`]; the error converts straight into a
//! JSON response `{ code, error, kind, details? }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Core application error type used across all SIMTAQ crates.
#[derive(Debug, thiserror::Error)]
pub enum SimtaqError {
    // === Auth errors ===
    #[error("Username atau password salah")]
    InvalidCredentials,

    #[error("Sesi telah berakhir, silakan login kembali")]
    TokenExpired,

    #[error("Sesi tidak valid")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    // === Resource errors ===
    #[error("{resource} tidak ditemukan")]
    NotFound { resource: String },

    #[error("{resource} sudah terdaftar")]
    AlreadyExists { resource: String },

    // === Validation errors ===
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    // === Permission errors ===
    #[error("Forbidden")]
    Forbidden,

    #[error("{reason}")]
    AccountInactive { reason: String },

    // === Rate limiting ===
    #[error("Terlalu banyak percobaan. Coba lagi dalam {minutes} menit")]
    RateLimited { minutes: i64, retry_after_ms: u64 },

    // === Infrastructure errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl SimtaqError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Wrap any displayable failure as an internal error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{err}"))
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden | Self::AccountInactive { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Map a unique-constraint violation to [`SimtaqError::AlreadyExists`], anything else passes through.
pub fn map_unique_violation(err: sqlx::Error, resource: &str) -> SimtaqError {
    on_unique_violation(err, || SimtaqError::already_exists(resource))
}

/// Replace a unique-constraint violation with the error built by `f`.
pub fn on_unique_violation(err: sqlx::Error, f: impl FnOnce() -> SimtaqError) -> SimtaqError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => f(),
        _ => SimtaqError::Database(err),
    }
}

impl IntoResponse for SimtaqError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.error_code();

        // Don't leak internal details to clients
        let message = match &self {
            SimtaqError::Database(e) => {
                tracing::error!("Database error: {e}");
                "Terjadi kesalahan pada server".to_string()
            }
            SimtaqError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                "Terjadi kesalahan pada server".to_string()
            }
            other => other.to_string(),
        };

        let details = match self {
            SimtaqError::Validation { details, .. } => details,
            SimtaqError::RateLimited { retry_after_ms, .. } => {
                Some(serde_json::json!({ "retryAfterMs": retry_after_ms }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: message,
            kind,
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using SimtaqError.
pub type SimtaqResult<T> = Result<T, SimtaqError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: SimtaqError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_mapping() {
        assert_eq!(SimtaqError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(SimtaqError::not_found("Siswa").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(SimtaqError::already_exists("NIS").status_code(), StatusCode::CONFLICT);
        assert_eq!(SimtaqError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SimtaqError::AccountInactive { reason: "x".into() }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            SimtaqError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_details_are_serialized() {
        let err = SimtaqError::validation_with(
            "Data tidak lengkap",
            serde_json::json!({ "missingFields": ["juz"] }),
        );
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["error"], "Data tidak lengkap");
        assert_eq!(body["kind"], "VALIDATION_ERROR");
        assert_eq!(body["details"]["missingFields"][0], "juz");
    }

    #[tokio::test]
    async fn internal_errors_are_hidden() {
        let (status, body) = body_json(SimtaqError::internal("connection refused")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Terjadi kesalahan pada server");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let err = SimtaqError::RateLimited {
            minutes: 3,
            retry_after_ms: 180_000,
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["details"]["retryAfterMs"], 180_000);
        assert!(body["error"].as_str().unwrap().contains("3 menit"));
    }
}
