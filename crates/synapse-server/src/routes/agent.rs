use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::models::{AgentCreate, Identity};
use crate::services;
use crate::state::AppState;

async fn create_agent(
    State(state): State<AppState>,
    payload: Result<Json<AgentCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Identity>)> {
    let Json(input) = payload?;
    let id = services::agent::create(state.repository.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(Identity { id })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agents", post(create_agent))
        .route("/agents/", post(create_agent))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{json_body, json_request, state};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn agent(name: &str, sub_agents: Vec<Uuid>) -> serde_json::Value {
        json!({
            "name": name,
            "description": "Looks things up",
            "instructions": "Cite sources",
            "model": {"name": "gpt-4.1", "settings": {"temperature": 0.2}},
            "sub_agents": sub_agents
        })
    }

    #[tokio::test]
    async fn test_create_agent_with_sub_agent() {
        let (state, repo) = state();
        let app = routes(state);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/agents/", agent("helper", vec![])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let helper: Identity = serde_json::from_value(json_body(response).await).unwrap();

        let response = app
            .oneshot(json_request("POST", "/agents", agent("lead", vec![helper.id])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let lead: Identity = serde_json::from_value(json_body(response).await).unwrap();

        assert_eq!(repo.sub_agents(lead.id), vec![helper.id]);
        let stored = repo.agent(lead.id).unwrap();
        assert_eq!(stored.model.settings.unwrap()["temperature"], json!(0.2));
    }

    #[tokio::test]
    async fn test_unknown_sub_agent_is_bad_request() {
        let (state, _) = state();
        let response = routes(state)
            .oneshot(json_request("POST", "/agents/", agent("lead", vec![Uuid::new_v4()])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Referenced entity does not exist"
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let (state, _) = state();
        let response = routes(state)
            .oneshot(json_request("POST", "/agents/", json!({"name": "lead"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }
}
