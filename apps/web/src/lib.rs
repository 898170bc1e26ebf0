use std::sync::Arc;

use axum::Router;
use stock::PriceSource;

pub mod config;
pub mod error;
pub mod routes;

use config::Config;

pub struct AppState<S> {
    pub config: Config,
    pub price_source: S,
}

/// Build the full application router.
pub fn app<S: PriceSource + 'static>(state: AppState<S>) -> Router {
    routes::router(Arc::new(state))
}
