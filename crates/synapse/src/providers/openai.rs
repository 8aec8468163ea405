use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Embedder, Provider, ProviderStream};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    chat_chunk_to_stream_events, check_openai_context_length_error, messages_to_openai_spec,
    sse_events,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::openapi::ToolFormat;

/// Post a JSON payload to an OpenAI endpoint, turning error statuses into errors
pub(crate) async fn post_openai(
    client: &Client,
    config: &OpenAiProviderConfig,
    endpoint: &str,
    payload: &Value,
) -> Result<Response> {
    let response = client
        .post(config.url(endpoint))
        .header("Authorization", format!("Bearer {}", config.api_key))
        .json(payload)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // Raise specific error if context length is exceeded
    if let Ok(error) = serde_json::from_str::<Value>(&body) {
        if let Some(err) = check_openai_context_length_error(&error["error"]) {
            return Err(err.into());
        }
    }
    Err(anyhow!("Request failed: {}\n{}", status, body))
}

pub(crate) fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(600)) // 10 minutes timeout
        .build()?)
}

/// The chat completions API, which also serves embeddings
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let mut messages_array = vec![json!({
            "role": "system",
            "content": system
        })];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
        });

        if !tools.is_empty() {
            payload["tools"] = json!(ToolFormat::Nested.render(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        Ok(payload)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream> {
        let payload = self.payload(system, messages, tools)?;
        let response = post_openai(&self.client, &self.config, "chat/completions", &payload).await?;

        Ok(Box::pin(sse_events(response, chat_chunk_to_stream_events)))
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let payload = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let response: Value = post_openai(&self.client, &self.config, "embeddings", &payload)
            .await?
            .json()
            .await?;

        let mut data = response
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| anyhow!("No embedding data in response"))?;
        data.sort_by_key(|item| item.get("index").and_then(Value::as_u64).unwrap_or_default());

        let embeddings = data
            .iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(Value::as_array)
                    .ok_or_else(|| anyhow!("Embedding item without a vector"))?
                    .iter()
                    .map(|v| {
                        v.as_f64()
                            .map(|v| v as f32)
                            .ok_or_else(|| anyhow!("Embedding contains a non-numeric value"))
                    })
                    .collect::<Result<Vec<f32>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings but received {}",
                texts.len(),
                embeddings.len()
            ));
        }
        Ok(embeddings)
    }
}
