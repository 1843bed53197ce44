use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use riskwatch_signals::{SourceKind, normalize};

use crate::app::{dto, errors};
use crate::app::services::{AppServices, run_blocking};

pub fn router() -> Router {
    Router::new().route("/", post(ingest_signal))
}

/// Normalize a pushed payload and append it to the supplier's signal log.
///
/// Scoring happens on the runner, not in the request: the response only says
/// whether the signal was new.
pub async fn ingest_signal(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::IngestSignalRequest>,
) -> axum::response::Response {
    let supplier_id = match errors::parse_supplier_id(&body.supplier_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind: SourceKind = match body.source_kind.parse() {
        Ok(k) => k,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_source_kind", format!("{e}")),
    };
    let supplier = match run_blocking(&services, move |s| s.supplier(supplier_id)).await {
        Ok(Some(supplier)) => supplier,
        Ok(None) => return errors::unknown_supplier(supplier_id),
        Err(resp) => return resp,
    };

    let signal = match normalize(&body.payload, kind, &supplier.location) {
        Ok(s) => s,
        Err(e) => {
            tracing::info!(supplier = %supplier_id, source = ?kind, error = %e, "pushed payload rejected");
            return errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_payload", e.to_string());
        }
    };

    let observed_at = signal.observed_at();
    let severity = signal.severity().value();
    let ingested = match run_blocking(&services, move |s| s.ingest(signal)).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match ingested {
        Ok(accepted) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "supplier_id": supplier_id.to_string(),
                "source_kind": kind,
                "observed_at": observed_at,
                "severity": severity,
                "duplicate": !accepted,
            })),
        )
            .into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
