// Export route modules
pub mod agent;
pub mod health;
pub mod knowledge_base;
pub mod knowledge_group;

use crate::state::AppState;
use axum::Router;

// Every route is served with and without its trailing slash
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(agent::routes(state.clone()))
        .merge(knowledge_group::routes(state.clone()))
        .merge(knowledge_base::routes(state))
        .merge(health::routes())
}
