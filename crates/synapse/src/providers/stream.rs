use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::utils::is_valid_function_name;
use crate::errors::AgentError;
use crate::models::message::ToolRequest;
use crate::models::tool::ToolCall;

/// One increment of a streamed model response.
///
/// Each variant only carries what the wire guarantees for it; tool-call
/// fragments are keyed by their position in the response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallId { index: usize, id: String },
    ToolCallName { index: usize, name: String },
    ToolCallArguments { index: usize, delta: String },
}

#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Rebuilds complete tool calls out of streamed fragments
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a tool-call event into its partial call. Text deltas are ignored.
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::TextDelta(_) => {}
            StreamEvent::ToolCallId { index, id } => {
                self.calls.entry(index).or_default().id = Some(id);
            }
            StreamEvent::ToolCallName { index, name } => {
                self.calls.entry(index).or_default().name = Some(name);
            }
            StreamEvent::ToolCallArguments { index, delta } => {
                self.calls.entry(index).or_default().arguments.push_str(&delta);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Complete tool requests in stream order.
    ///
    /// A call without a usable name or with arguments that are not valid JSON
    /// still yields a request, carrying the error for the model to see.
    pub fn finish(self) -> Vec<ToolRequest> {
        self.calls
            .into_iter()
            .map(|(index, call)| {
                let id = call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let tool_call = complete_call(index, &id, call.name, &call.arguments);
                ToolRequest { id, tool_call }
            })
            .collect()
    }
}

fn complete_call(
    index: usize,
    id: &str,
    name: Option<String>,
    arguments: &str,
) -> Result<ToolCall, AgentError> {
    let name = name.filter(|name| !name.is_empty()).ok_or_else(|| {
        AgentError::ToolNotFound(format!(
            "The tool call at position {} did not include a function name",
            index
        ))
    })?;

    if !is_valid_function_name(&name) {
        return Err(AgentError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            name
        )));
    }

    let arguments = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str::<Value>(arguments).map_err(|e| {
            AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ))
        })?
    };

    Ok(ToolCall::new(name, arguments))
}
