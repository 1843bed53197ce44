use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::sse::Event as SseEvent,
};
use serde::Deserialize;

use crate::app::{errors, services::{self, AppServices}};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub supplier_id: Option<String>,
}

/// Realtime board updates, optionally for one supplier.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<StreamQuery>,
) -> Result<
    axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>>,
    axum::response::Response,
> {
    let supplier = q.supplier_id.as_deref().map(errors::parse_supplier_id).transpose()?;
    Ok(services::trend_sse_stream(services, supplier))
}
