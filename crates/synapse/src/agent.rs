use anyhow::{anyhow, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::dispatch::HttpDispatcher;
use crate::errors::AgentResult;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, ToolRequest, ToolResponse};
use crate::models::tool::{Tool, ToolCall};
use crate::openapi::{build_tools, ToolFormat};
use crate::providers::base::Provider;
use crate::providers::stream::{StreamEvent, ToolCallAccumulator};

/// Model rounds allowed within a single turn before giving up
pub const DEFAULT_MAX_ROUNDS: usize = 16;

/// What a turn produces while it runs
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// All assistant text of the current round received so far
    Content(String),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

/// Agent drives a chat model over the operations of an HTTP API
pub struct Agent {
    provider: Box<dyn Provider>,
    dispatcher: HttpDispatcher,
    tools: Vec<Tool>,
    max_rounds: usize,
}

impl Agent {
    /// Create an agent offering one tool per operation of the dispatcher's document.
    ///
    /// Fails when two operations share an operationId, since no model API
    /// accepts a tool list with repeated names.
    pub fn new(provider: Box<dyn Provider>, dispatcher: HttpDispatcher) -> Result<Self> {
        let tools = build_tools(dispatcher.document());
        ToolFormat::default().render(&tools)?;
        Ok(Self {
            provider,
            dispatcher,
            tools,
            max_rounds: DEFAULT_MAX_ROUNDS,
        })
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Dispatch a single tool call to the endpoint it names
    async fn dispatch_tool_call(&self, tool_call: AgentResult<ToolCall>) -> AgentResult<String> {
        let call = tool_call?;
        Ok(self.dispatcher.call(&call.name, &call.arguments).await?)
    }

    /// Run one turn: append the prompt, then alternate between the model and the
    /// requested tool calls until the model answers without calling a tool.
    ///
    /// Every message of the turn is appended to `conversation` as it happens, so
    /// dropping the stream early leaves a partial turn behind.
    pub fn reply<'a>(
        &'a self,
        conversation: &'a mut Conversation,
        prompt: &str,
    ) -> BoxStream<'a, Result<ReplyEvent>> {
        conversation.push(Message::user().with_text(prompt));

        Box::pin(async_stream::try_stream! {
            let mut answered = false;

            for round in 1..=self.max_rounds {
                debug!(round, messages = conversation.len(), "requesting completion");
                let mut events = self
                    .provider
                    .stream(&conversation.system, &conversation.messages, &self.tools)
                    .await?;

                let mut content = String::new();
                let mut accumulator = ToolCallAccumulator::new();
                while let Some(event) = events.next().await {
                    match event? {
                        StreamEvent::TextDelta(delta) => {
                            content.push_str(&delta);
                            yield ReplyEvent::Content(content.clone());
                        }
                        other => accumulator.apply(other),
                    }
                }

                if accumulator.is_empty() {
                    conversation.push(Message::assistant().with_text(content));
                    answered = true;
                    break;
                }

                if !content.is_empty() {
                    conversation.push(Message::assistant().with_text(content));
                }

                for request in accumulator.finish() {
                    let result = self.dispatch_tool_call(request.tool_call.clone()).await;
                    let response = ToolResponse {
                        id: request.id.clone(),
                        tool_result: result,
                    };

                    conversation.push(
                        Message::assistant()
                            .with_tool_request(request.id.clone(), request.tool_call.clone()),
                    );
                    conversation.push(
                        Message::user()
                            .with_tool_response(response.id.clone(), response.tool_result.clone()),
                    );

                    yield ReplyEvent::ToolRequest(request);
                    yield ReplyEvent::ToolResponse(response);
                }
            }

            if !answered {
                Err::<(), _>(anyhow!(
                    "The model kept calling tools for {} rounds without answering",
                    self.max_rounds
                ))?;
            }
        })
    }
}
