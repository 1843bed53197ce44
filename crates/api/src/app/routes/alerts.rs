use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::dto;
use crate::app::services::{AppServices, run_blocking};

pub fn router() -> Router {
    Router::new().route("/", get(list_alerts))
}

/// Recent state transitions, newest first.
pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::AlertsQuery>,
) -> axum::response::Response {
    let transitions = match run_blocking(&services, |s| s.recent_transitions()).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let items = transitions
        .into_iter()
        .filter(|t| !q.only_alerts || t.is_alert())
        .take(q.limit.unwrap_or(usize::MAX))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
