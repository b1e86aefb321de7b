//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::SimtaqError;

/// Indonesian mobile numbers: `08..`, `628..` or `+628..`.
pub static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+62|62|0)8[0-9]{7,12}$").expect("phone regex"));

/// School and national student numbers are digits only.
pub static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4,20}$").expect("digits regex"));

/// Validate a request body, returning a SimtaqError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), SimtaqError> {
    body.validate().map_err(|e| {
        let fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
        SimtaqError::validation_with(format_validation_errors(&e), json!({ "fields": fields }))
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Nilai '{field}' tidak valid"))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Fail with the list of missing fields when any required value is absent.
///
/// ```ignore
/// require_fields(&[("siswaId", body.siswa_id.is_some()), ("juz", body.juz.is_some())])?;
/// ```
pub fn require_fields(fields: &[(&str, bool)]) -> Result<(), SimtaqError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(SimtaqError::validation_with(
        format!("Data tidak lengkap: {}", missing.join(", ")),
        json!({ "missingFields": missing }),
    ))
}

/// Validate an optional phone number against [`PHONE_RE`].
pub fn validate_phone(value: Option<&str>) -> Result<(), SimtaqError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(phone) if !PHONE_RE.is_match(phone) => Err(SimtaqError::validation(
            "Format nomor telepon tidak valid (contoh: 081234567890)",
        )),
        _ => Ok(()),
    }
}

/// Validate that a score lies in `min..=max`.
pub fn validate_score(field: &str, value: f64, min: f64, max: f64) -> Result<(), SimtaqError> {
    if !value.is_finite() || value < min || value > max {
        return Err(SimtaqError::validation(format!(
            "Nilai {field} harus antara {min} dan {max}"
        )));
    }
    Ok(())
}

/// Normalise paging parameters: page starts at 1, limit is clamped to `1..=100`.
pub fn page_params(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, 100);
    (page, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Body {
        #[validate(length(min = 8, message = "Password minimal 8 karakter"))]
        password: String,
    }

    #[test]
    fn validate_request_reports_field() {
        let err = validate_request(&Body {
            password: "short".into(),
        })
        .unwrap_err();
        match err {
            SimtaqError::Validation { message, details } => {
                assert_eq!(message, "Password minimal 8 karakter");
                assert_eq!(details.unwrap()["fields"][0], "password");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn require_fields_lists_missing() {
        assert!(require_fields(&[("a", true), ("b", true)]).is_ok());
        let err = require_fields(&[("siswaId", false), ("juz", true), ("surah", false)]).unwrap_err();
        match err {
            SimtaqError::Validation { details, .. } => {
                assert_eq!(details.unwrap()["missingFields"], json!(["siswaId", "surah"]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn phone_numbers() {
        assert!(validate_phone(Some("081234567890")).is_ok());
        assert!(validate_phone(Some("+6281234567")).is_ok());
        assert!(validate_phone(None).is_ok());
        assert!(validate_phone(Some("  ")).is_ok());
        assert!(validate_phone(Some("0212345678")).is_err());
        assert!(validate_phone(Some("08abc")).is_err());
    }

    #[test]
    fn scores_and_paging() {
        assert!(validate_score("tajwid", 1.0, 1.0, 100.0).is_ok());
        assert!(validate_score("tajwid", 0.0, 1.0, 100.0).is_err());
        assert!(validate_score("tajwid", f64::NAN, 0.0, 100.0).is_err());
        assert_eq!(page_params(None, None, 10), (1, 10));
        assert_eq!(page_params(Some(0), Some(500), 10), (1, 100));
    }
}
