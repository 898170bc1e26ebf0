mod download;
mod index;

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use stock::PriceSource;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router<S: PriceSource + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(index::index::<S>))
        .route("/download", get(download::download::<S>))
        .route("/health", get(health::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health<S: PriceSource + 'static>(State(state): State<Arc<AppState<S>>>) -> Json<Value> {
    Json(json!({ "status": "ok", "version": state.config.version }))
}
