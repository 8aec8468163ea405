use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::base::{Provider, ProviderStream};
use super::configs::OpenAiProviderConfig;
use super::openai::{build_client, post_openai};
use super::utils::{
    messages_to_responses_spec, responses_event_to_stream_events, sse_events,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::openapi::ToolFormat;

/// The responses API. The system prompt travels as `instructions`.
pub struct OpenAiResponsesProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiResponsesProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "instructions": system,
            "input": messages_to_responses_spec(messages),
            "stream": true,
        });

        if !tools.is_empty() {
            payload["tools"] = json!(ToolFormat::Flat.render(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_output_tokens"] = json!(tokens);
        }
        Ok(payload)
    }
}

#[async_trait]
impl Provider for OpenAiResponsesProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream> {
        let payload = self.payload(system, messages, tools)?;
        let response = post_openai(&self.client, &self.config, "responses", &payload).await?;
        Ok(Box::pin(sse_events(
            response,
            responses_event_to_stream_events,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::stream::StreamEvent;
    use futures::{StreamExt, TryStreamExt};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(events: &[Value]) -> String {
        events
            .iter()
            .map(|event| format!("event: {}\ndata: {}\n\n", event["type"].as_str().unwrap(), event))
            .collect()
    }

    async fn mount(server: &MockServer, body: String) {
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(body_partial_json(json!({
                "model": "gpt-4.1",
                "instructions": "Be brief.",
                "stream": true,
                "tools": [{"type": "function", "name": "trending"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn provider(server: &MockServer) -> OpenAiResponsesProvider {
        OpenAiResponsesProvider::new(OpenAiProviderConfig::new("key").with_host(server.uri()))
            .unwrap()
    }

    fn tools() -> Vec<Tool> {
        vec![Tool::new("trending", "Trending movies", json!({"type": "object"}))]
    }

    #[tokio::test]
    async fn test_stream_function_call() -> Result<()> {
        let server = MockServer::start().await;
        mount(
            &server,
            sse_body(&[
                json!({"type": "response.created", "response": {"id": "resp_1"}}),
                json!({"type": "response.output_text.delta", "output_index": 0, "delta": "Checking"}),
                json!({"type": "response.output_item.added", "output_index": 1,
                       "item": {"type": "function_call", "call_id": "call_1", "name": "trending", "arguments": ""}}),
                json!({"type": "response.function_call_arguments.delta", "output_index": 1, "delta": "{\"window\""}),
                json!({"type": "response.function_call_arguments.delta", "output_index": 1, "delta": ":\"week\"}"}),
                json!({"type": "response.completed", "response": {"id": "resp_1"}}),
            ]),
        )
        .await;

        let events: Vec<StreamEvent> = provider(&server)
            .stream("Be brief.", &[Message::user().with_text("What's hot?")], &tools())
            .await?
            .try_collect()
            .await?;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Checking".to_string()),
                StreamEvent::ToolCallId { index: 1, id: "call_1".to_string() },
                StreamEvent::ToolCallName { index: 1, name: "trending".to_string() },
                StreamEvent::ToolCallArguments { index: 1, delta: "{\"window\"".to_string() },
                StreamEvent::ToolCallArguments { index: 1, delta: ":\"week\"}".to_string() },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_response_ends_stream_with_error() -> Result<()> {
        let server = MockServer::start().await;
        mount(
            &server,
            sse_body(&[
                json!({"type": "response.output_text.delta", "output_index": 0, "delta": "Hi"}),
                json!({"type": "response.failed", "response": {"error": {"code": "server_error", "message": "boom"}}}),
            ]),
        )
        .await;

        let mut stream = provider(&server).stream("Be brief.", &[], &tools()).await?;
        assert_eq!(
            stream.next().await.unwrap()?,
            StreamEvent::TextDelta("Hi".to_string())
        );
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        Ok(())
    }
}
