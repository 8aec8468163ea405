use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::stream::StreamEvent;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Incremental events of one model response
pub type ProviderStream = BoxStream<'static, Result<StreamEvent>>;

/// Base trait for chat model providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open a streamed completion of the conversation, offering the given tools
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream>;
}

/// Turns text into embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
