use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::models::{Identity, KnowledgeGroupCreate};
use crate::services;
use crate::state::AppState;

async fn create_knowledge_group(
    State(state): State<AppState>,
    payload: Result<Json<KnowledgeGroupCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Identity>)> {
    let Json(input) = payload?;
    let id = services::knowledge_group::create(state.repository.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(Identity { id })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/knowledge-groups", post(create_knowledge_group))
        .route("/knowledge-groups/", post(create_knowledge_group))
        .with_state(state)
}
