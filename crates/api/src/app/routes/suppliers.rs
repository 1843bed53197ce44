use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use riskwatch_monitor::TrendState;

use crate::app::{dto, errors};
use crate::app::services::{AppServices, run_blocking};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers))
        .route("/:id", get(get_supplier))
        .route("/:id/trend", get(get_trend))
}

/// Dashboard rows: highest latest score first, unscored suppliers last.
pub async fn list_suppliers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let loaded = run_blocking(&services, |s| (s.board_rows(), s.suppliers())).await;
    let (rows, mut suppliers) = match loaded {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    suppliers.sort_by_key(|s| {
        (
            rows.iter().position(|r| r.supplier_id == s.id).unwrap_or(usize::MAX),
            s.name.clone(),
        )
    });

    let items = suppliers
        .iter()
        .map(|s| dto::supplier_summary(s, rows.iter().find(|r| r.supplier_id == s.id)))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_supplier_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let loaded = run_blocking(&services, move |s| {
        s.supplier(id).map(|supplier| {
            let state = s.board_row(id).map_or(TrendState::Normal, |r| r.state);
            (supplier, state, s.latest_assessment(id))
        })
    })
    .await;

    match loaded {
        Ok(Some((supplier, state, assessment))) => (
            StatusCode::OK,
            Json(dto::supplier_detail(&supplier, state, assessment.as_ref())),
        )
            .into_response(),
        Ok(None) => errors::unknown_supplier(id),
        Err(resp) => resp,
    }
}

pub async fn get_trend(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_supplier_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let loaded = run_blocking(&services, move |s| s.supplier(id).map(|_| s.trend(id))).await;
    match loaded {
        Ok(Some(Ok(trend))) => (StatusCode::OK, Json(dto::trend_to_json(id, trend.as_ref()))).into_response(),
        Ok(Some(Err(e))) => errors::aggregator_error_to_response(e),
        Ok(None) => errors::unknown_supplier(id),
        Err(resp) => resp,
    }
}
