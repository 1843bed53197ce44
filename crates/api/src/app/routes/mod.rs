use axum::{Router, routing::get};

pub mod alerts;
pub mod signals;
pub mod suppliers;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/suppliers", suppliers::router())
        .nest("/alerts", alerts::router())
        .nest("/signals", signals::router())
}
