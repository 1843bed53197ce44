use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use riskwatch_core::SupplierId;
use riskwatch_infra::PipelineError;
use riskwatch_monitor::AggregatorError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_supplier_id(raw: &str) -> Result<SupplierId, axum::response::Response> {
    raw.parse::<SupplierId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn unknown_supplier(id: SupplierId) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("supplier {id} is not monitored"))
}

pub fn aggregator_error_to_response(err: AggregatorError) -> axum::response::Response {
    match err {
        AggregatorError::Rejected(e) => json_error(StatusCode::CONFLICT, "rejected", e.to_string()),
        e @ (AggregatorError::Store(_) | AggregatorError::Persistence { .. }) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_error", e.to_string())
        }
        e @ AggregatorError::Poisoned { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
        }
    }
}

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::UnknownSupplier(id) => unknown_supplier(id),
        PipelineError::Scoring(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "scoring_error", e.to_string()),
        PipelineError::Aggregation(e) => aggregator_error_to_response(e),
        e @ (PipelineError::SignalLog(_) | PipelineError::AssessmentsPoisoned) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
        }
    }
}
