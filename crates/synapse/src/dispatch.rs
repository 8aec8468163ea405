use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::errors::AgentError;
use crate::openapi::{HttpMethod, OpenApiDocument, OpenApiError, ParameterLocation};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Tool {0} is not mapped to an endpoint")]
    ToolNotMapped(String),

    #[error("Missing value for path parameter '{0}'")]
    MissingPathParameter(String),

    #[error("Tool arguments must be a JSON object, got: {0}")]
    InvalidArguments(Value),

    #[error(transparent)]
    OpenApi(#[from] OpenApiError),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<DispatchError> for AgentError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::ToolNotMapped(name) => AgentError::ToolNotFound(name),
            DispatchError::MissingPathParameter(_) | DispatchError::InvalidArguments(_) => {
                AgentError::InvalidParameters(error.to_string())
            }
            other => AgentError::ExecutionError(other.to_string()),
        }
    }
}

/// Everything needed to issue the HTTP call for one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Hook that can rewrite a request right before it is sent
pub type BeforeRequest = Box<dyn Fn(PreparedRequest) -> PreparedRequest + Send + Sync>;

/// Executes tool calls against the endpoints of an OpenAPI document
pub struct HttpDispatcher {
    document: Arc<OpenApiDocument>,
    client: Client,
    before_request: Option<BeforeRequest>,
}

impl HttpDispatcher {
    pub fn new(document: Arc<OpenApiDocument>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            document,
            client,
            before_request: None,
        })
    }

    pub fn with_before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(PreparedRequest) -> PreparedRequest + Send + Sync + 'static,
    {
        self.before_request = Some(Box::new(hook));
        self
    }

    /// Send `Authorization: Bearer <token>` with every call
    pub fn with_bearer_token<S: Into<String>>(self, token: S) -> Self {
        let value = format!("Bearer {}", token.into());
        self.with_before_request(move |mut request| {
            request
                .headers
                .insert("Authorization".to_string(), value.clone());
            request
        })
    }

    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    /// Map a tool call onto the HTTP request of its operation, hook included.
    pub fn prepare(
        &self,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<PreparedRequest, DispatchError> {
        let operation = self
            .document
            .find_operation(tool_name)
            .ok_or_else(|| DispatchError::ToolNotMapped(tool_name.to_string()))?;

        let empty = Map::new();
        let arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(DispatchError::InvalidArguments(other.clone())),
        };

        let base_url = self.document.base_url()?.trim_end_matches('/');
        let path = render_path(operation.path, arguments)?;
        let url = format!("{}/{}", base_url, path.trim_start_matches('/'));

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        let mut query = Vec::new();

        for parameter in operation.parameters() {
            let Some(value) = arguments.get(&parameter.name) else {
                continue;
            };
            match parameter.location {
                ParameterLocation::Query => match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        for item in items {
                            query.push((parameter.name.clone(), param_text(item)));
                        }
                    }
                    other => query.push((parameter.name.clone(), param_text(other))),
                },
                ParameterLocation::Header => {
                    headers.insert(parameter.name.clone(), param_text(value));
                }
                ParameterLocation::Path | ParameterLocation::Cookie => {}
            }
        }

        let mut body = None;
        if operation.operation.request_body.is_some() {
            if let Some(value) = arguments.get("body") {
                body = Some(value.clone());
                headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
        }

        let request = PreparedRequest {
            method: operation.method,
            url,
            headers,
            query,
            body,
        };

        Ok(match &self.before_request {
            Some(hook) => hook(request),
            None => request,
        })
    }

    /// Invoke the endpoint behind `tool_name` and return the response body.
    ///
    /// JSON bodies are returned re-serialised in compact form, anything else as
    /// the raw text. Non-2xx responses are errors carrying the body.
    pub async fn call(&self, tool_name: &str, arguments: &Value) -> Result<String, DispatchError> {
        tracing::info!(
            "Calling tool '{}' with arguments:\n{}",
            tool_name,
            serde_json::to_string_pretty(arguments).unwrap_or_default()
        );

        let result = match self.prepare(tool_name, arguments) {
            Ok(request) => self.send(request).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(text) => tracing::info!("Response from tool '{}':\n{}", tool_name, text),
            Err(e) => tracing::error!("Error calling tool '{}': {}", tool_name, e),
        }
        result
    }

    async fn send(&self, request: PreparedRequest) -> Result<String, DispatchError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(DispatchError::Status { status, body: text });
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(data) => Ok(data.to_string()),
            Err(_) => Ok(text),
        }
    }
}

/// Replace every `{name}` token of a path template with the percent-encoded
/// argument of the same name.
pub fn render_path(template: &str, arguments: &Map<String, Value>) -> Result<String, DispatchError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + length];
        let value = arguments
            .get(name)
            .filter(|value| !value.is_null())
            .ok_or_else(|| DispatchError::MissingPathParameter(name.to_string()))?;

        rendered.push_str(&rest[..start]);
        rendered.push_str(&urlencoding::encode(&param_text(value)));
        rest = &rest[start + length + 1..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Strings are sent as-is, everything else as its JSON text
fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::formatdoc;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document(base_url: &str) -> Arc<OpenApiDocument> {
        let text = formatdoc!(
            r#"
                openapi: 3.0.0
                servers:
                  - url: {}/3/
                paths:
                  /movie/{{movie_id}}:
                    get:
                      operationId: movie-details
                      parameters:
                        - name: movie_id
                          in: path
                          required: true
                        - name: language
                          in: query
                        - name: append_to_response
                          in: query
                        - name: x-region
                          in: header
                  /movie/{{movie_id}}/rating:
                    post:
                      operationId: movie-add-rating
                      parameters:
                        - name: movie_id
                          in: path
                          required: true
                      requestBody:
                        required: true
                        content:
                          application/json:
                            schema:
                              type: object
                  /search/{{kind}}:
                    get:
                      operationId: search
                      parameters:
                        - name: query
                          in: query
                  /search/movie:
                    get:
                      operationId: search
            "#,
            base_url
        );
        Arc::new(text.parse().unwrap())
    }

    #[test]
    fn test_prepare_maps_parameters() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let request = dispatcher
            .prepare(
                "movie-details",
                &json!({
                    "movie_id": 603,
                    "language": "en-US",
                    "append_to_response": ["credits", "videos"],
                    "x-region": 42,
                    "body": {"ignored": true}
                }),
            )
            .unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://api.movies.test/3/movie/603");
        assert_eq!(
            request.query,
            vec![
                ("language".to_string(), "en-US".to_string()),
                ("append_to_response".to_string(), "credits".to_string()),
                ("append_to_response".to_string(), "videos".to_string()),
            ]
        );
        assert_eq!(request.headers["x-region"], "42");
        assert_eq!(request.headers["Accept"], "application/json");
        assert!(request.body.is_none());
        assert!(!request.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let request = dispatcher
            .prepare("movie-details", &json!({"movie_id": "The Matrix/Reloaded"}))
            .unwrap();

        assert_eq!(
            request.url,
            "https://api.movies.test/3/movie/The%20Matrix%2FReloaded"
        );
    }

    #[test]
    fn test_literal_value_replaces_token() {
        let arguments = json!({"movie_id": "tt0133093"});
        let rendered = render_path("/movie/{movie_id}/credits", arguments.as_object().unwrap()).unwrap();
        assert_eq!(rendered, "/movie/tt0133093/credits");
    }

    #[test]
    fn test_missing_path_parameter() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let error = dispatcher.prepare("movie-details", &json!({})).unwrap_err();
        assert!(matches!(error, DispatchError::MissingPathParameter(name) if name == "movie_id"));
    }

    #[test]
    fn test_body_sets_content_type() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let request = dispatcher
            .prepare("movie-add-rating", &json!({"movie_id": 603, "body": {"value": 8.5}}))
            .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Some(json!({"value": 8.5})));
        assert_eq!(request.headers["Content-Type"], "application/json");
    }

    #[test]
    fn test_unknown_tool_is_not_mapped() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let error = dispatcher.prepare("tv-details", &json!({})).unwrap_err();
        assert!(matches!(error, DispatchError::ToolNotMapped(_)));
        assert!(matches!(AgentError::from(error), AgentError::ToolNotFound(name) if name == "tv-details"));
    }

    #[test]
    fn test_duplicate_operation_id_uses_first_in_document() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let request = dispatcher
            .prepare("search", &json!({"kind": "tv", "query": "Dark"}))
            .unwrap();
        assert_eq!(request.url, "https://api.movies.test/3/search/tv");
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();
        let error = dispatcher.prepare("search", &json!([1, 2])).unwrap_err();
        assert!(matches!(
            AgentError::from(error),
            AgentError::InvalidParameters(_)
        ));
    }

    #[test]
    fn test_before_request_hook_can_rewrite() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test"))
            .unwrap()
            .with_before_request(|mut request| {
                request.query.push(("api_key".to_string(), "secret".to_string()));
                request
            });
        let request = dispatcher
            .prepare("movie-details", &json!({"movie_id": 1}))
            .unwrap();
        assert_eq!(
            request.query,
            vec![("api_key".to_string(), "secret".to_string())]
        );
    }

    #[tokio::test]
    async fn test_call_returns_compact_json_and_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/603"))
            .and(query_param("language", "en-US"))
            .and(header("Authorization", "Bearer token-123"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\n  \"id\": 603,\n  \"title\": \"The Matrix\"\n}",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new(document(&server.uri()))
            .unwrap()
            .with_bearer_token("token-123");
        let text = dispatcher
            .call("movie-details", &json!({"movie_id": 603, "language": "en-US"}))
            .await
            .unwrap();

        assert_eq!(text, r#"{"id":603,"title":"The Matrix"}"#);
    }

    #[tokio::test]
    async fn test_call_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/3/movie/603/rating"))
            .and(body_json(json!({"value": 8.5})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new(document(&server.uri())).unwrap();
        let text = dispatcher
            .call("movie-add-rating", &json!({"movie_id": 603, "body": {"value": 8.5}}))
            .await
            .unwrap();

        assert_eq!(text, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_call_error_status_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/0"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"status_message":"The resource you requested could not be found."}"#),
            )
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new(document(&server.uri())).unwrap();
        let error = dispatcher
            .call("movie-details", &json!({"movie_id": 0}))
            .await
            .unwrap_err();

        match error {
            DispatchError::Status { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(body.contains("could not be found"));
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dispatcher =
            HttpDispatcher::new(document(&format!("http://127.0.0.1:{}", port))).unwrap();
        let error = dispatcher
            .call("movie-details", &json!({"movie_id": 603}))
            .await
            .unwrap_err();

        assert!(matches!(error, DispatchError::Transport(_)));
        assert!(matches!(
            AgentError::from(error),
            AgentError::ExecutionError(_)
        ));
    }

    #[tokio::test]
    async fn test_call_reports_unprepared_requests() {
        let dispatcher = HttpDispatcher::new(document("https://api.movies.test")).unwrap();

        let error = dispatcher.call("tv-details", &json!({})).await.unwrap_err();
        assert!(matches!(error, DispatchError::ToolNotMapped(_)));

        let error = dispatcher.call("movie-details", &json!({})).await.unwrap_err();
        assert!(matches!(error, DispatchError::MissingPathParameter(_)));
    }

    #[tokio::test]
    async fn test_call_plain_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new(document(&server.uri())).unwrap();
        // the first "search" operation is /search/{kind}
        let text = dispatcher
            .call("search", &json!({"kind": "movie"}))
            .await
            .unwrap();
        assert_eq!(text, "pong");
    }
}
