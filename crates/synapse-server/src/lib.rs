pub mod configuration;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The knowledge API with request tracing and permissive CORS
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
