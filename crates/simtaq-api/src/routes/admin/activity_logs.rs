use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    models::{activity::ActivityLog, user::Role, Pagination},
    validation::page_params,
};
use simtaq_db::repository::activity_logs::{self, ActivityFilter};
use std::sync::Arc;
use uuid::Uuid;

use super::Paged;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/activity-logs", get(list))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogQuery {
    page: Option<i64>,
    limit: Option<i64>,
    role: Option<Role>,
    action: Option<String>,
    actor_id: Option<Uuid>,
    from: Option<String>,
    to: Option<String>,
    search: Option<String>,
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD`. A bare `to` date
/// covers the whole day.
fn parse_bound(field: &str, value: Option<&str>, end_of_day: bool) -> SimtaqResult<Option<DateTime<Utc>>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| SimtaqError::validation(format!("Format tanggal '{field}' tidak valid")))?;
    let date = if end_of_day {
        date.checked_add_days(Days::new(1)).unwrap_or(date)
    } else {
        date
    };
    Ok(Some(date.and_time(chrono::NaiveTime::MIN).and_utc()))
}

/// GET /api/admin/activity-logs
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> SimtaqResult<Json<Paged<ActivityLog>>> {
    let filter = ActivityFilter {
        role: query.role,
        action: query.action.filter(|a| !a.trim().is_empty()),
        actor_id: query.actor_id,
        from: parse_bound("from", query.from.as_deref(), false)?,
        to: parse_bound("to", query.to.as_deref(), true)?,
        search: query.search,
    };
    let (page, limit) = page_params(query.page, query.limit, 50);

    let total = activity_logs::count(&state.db.pg, &filter).await?;
    let pagination = Pagination::new(page, limit, total);
    let data = activity_logs::list(&state.db.pg, &filter, limit, pagination.offset()).await?;

    Ok(Json(Paged { data, pagination }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_bounds() {
        let from = parse_bound("from", Some("2024-03-01"), false).unwrap().unwrap();
        assert_eq!(from.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let to = parse_bound("to", Some("2024-03-01"), true).unwrap().unwrap();
        assert_eq!(to.to_rfc3339(), "2024-03-02T00:00:00+00:00");

        let exact = parse_bound("to", Some("2024-03-01T10:30:00+07:00"), true).unwrap().unwrap();
        assert_eq!(exact.to_rfc3339(), "2024-03-01T03:30:00+00:00");

        assert!(parse_bound("from", Some(" "), false).unwrap().is_none());
        assert!(parse_bound("from", Some("kemarin"), false).is_err());
    }
}
