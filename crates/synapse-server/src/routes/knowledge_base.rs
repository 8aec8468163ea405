use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{KnowledgeBaseCreate, KnowledgeBaseSearch, SearchParams};
use crate::services;
use crate::state::AppState;

const DEFAULT_K: i64 = 5;
const MAX_K: i64 = 50;

/// A search request whose values passed validation
#[derive(Debug, PartialEq)]
struct ValidSearch {
    query: String,
    k: usize,
    threshold: Option<f64>,
}

fn validate(params: SearchParams) -> ApiResult<ValidSearch> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError::bad_request("Query parameter 'q' must not be empty"));
    }

    let k = params.k.unwrap_or(DEFAULT_K);
    if !(1..=MAX_K).contains(&k) {
        return Err(ApiError::bad_request(format!(
            "Query parameter 'k' must be between 1 and {}",
            MAX_K
        )));
    }

    if let Some(threshold) = params.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::bad_request(
                "Query parameter 'threshold' must be between 0 and 1",
            ));
        }
    }

    Ok(ValidSearch {
        query,
        k: k as usize,
        threshold: params.threshold,
    })
}

async fn create_knowledge_bases(
    State(state): State<AppState>,
    group_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<Vec<KnowledgeBaseCreate>>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vec<Uuid>>)> {
    let Path(group_id) = group_id?;
    let Json(documents) = payload?;
    let ids = services::knowledge_base::create(
        state.repository.as_ref(),
        state.embedder.as_ref(),
        state.dimensions,
        group_id,
        documents,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ids)))
}

async fn search_knowledge_bases(
    State(state): State<AppState>,
    group_id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Vec<KnowledgeBaseSearch>>> {
    let Path(group_id) = group_id?;
    let Query(params) = params?;
    let search = validate(params)?;
    let hits = services::knowledge_base::search(
        state.repository.as_ref(),
        state.embedder.as_ref(),
        state.dimensions,
        group_id,
        &search.query,
        search.k,
        search.threshold,
    )
    .await?;
    Ok(Json(hits))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/knowledge-groups/:group_id/knowledge-bases",
            post(create_knowledge_bases),
        )
        .route(
            "/knowledge-groups/:group_id/knowledge-bases/",
            post(create_knowledge_bases),
        )
        .route(
            "/knowledge-groups/:group_id/knowledge-bases/-/search",
            get(search_knowledge_bases),
        )
        .route(
            "/knowledge-groups/:group_id/knowledge-bases/-/search/",
            get(search_knowledge_bases),
        )
        .with_state(state)
}
