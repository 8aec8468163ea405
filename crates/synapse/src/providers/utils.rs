use anyhow::{anyhow, Result};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Response;
use serde_json::{json, Value};

use super::stream::StreamEvent;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::Tool;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Name sent back to the model for a tool request that never had a usable call
pub const INVALID_TOOL_CALL_NAME: &str = "invalid_tool_call";

fn tool_error_text(error: impl std::fmt::Display) -> String {
    // A tool result error is shown as output so the model can interpret the error message
    format!("The tool call returned the following error:\n{}", error)
}

/// Convert internal Message format to the chat completions message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(content) => text.push_str(&content.text),
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        Err(_) => (INVALID_TOOL_CALL_NAME.to_string(), "{}".to_string()),
                    };
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments,
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    let content = match &response.tool_result {
                        Ok(result) => result.clone(),
                        Err(e) => tool_error_text(e),
                    };
                    output.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if !text.is_empty() || !tool_calls.is_empty() {
            let mut converted = json!({ "role": message.role });
            if !text.is_empty() {
                converted["content"] = json!(text);
            }
            if !tool_calls.is_empty() {
                converted["tool_calls"] = json!(tool_calls);
            }
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Message format to input items of the responses API
pub fn messages_to_responses_spec(messages: &[Message]) -> Vec<Value> {
    let mut items = Vec::new();

    for message in messages {
        for content in &message.content {
            match content {
                MessageContent::Text(content) => {
                    if content.text.is_empty() {
                        continue;
                    }
                    let kind = match message.role {
                        Role::User => "input_text",
                        Role::Assistant => "output_text",
                    };
                    items.push(json!({
                        "role": message.role,
                        "content": [{ "type": kind, "text": content.text }]
                    }));
                }
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        Err(_) => (INVALID_TOOL_CALL_NAME.to_string(), "{}".to_string()),
                    };
                    items.push(json!({
                        "type": "function_call",
                        "call_id": request.id,
                        "name": name,
                        "arguments": arguments,
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    let output = match &response.tool_result {
                        Ok(result) => result.clone(),
                        Err(e) => tool_error_text(e),
                    };
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": response.id,
                        "output": output,
                    }));
                }
            }
        }
    }

    items
}

/// Convert internal Tool format to the chat completions tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert internal Tool format to the flat tool specification of the responses API
pub fn tools_to_responses_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }));
    }

    Ok(result)
}

/// Events carried by one streamed chat completions chunk
pub fn chat_chunk_to_stream_events(chunk: &Value) -> Result<Vec<StreamEvent>> {
    if let Some(error) = chunk.get("error") {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("OpenAI API error: {}", error));
    }

    let mut events = Vec::new();
    let delta = &chunk["choices"][0]["delta"];

    if let Some(text) = delta.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            events.push(StreamEvent::TextDelta(text.to_string()));
        }
    }

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for (position, tool_call) in tool_calls.iter().enumerate() {
            let index = tool_call
                .get("index")
                .and_then(Value::as_u64)
                .map(|index| index as usize)
                .unwrap_or(position);

            if let Some(id) = tool_call.get("id").and_then(Value::as_str) {
                events.push(StreamEvent::ToolCallId {
                    index,
                    id: id.to_string(),
                });
            }
            let function = &tool_call["function"];
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                events.push(StreamEvent::ToolCallName {
                    index,
                    name: name.to_string(),
                });
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                if !arguments.is_empty() {
                    events.push(StreamEvent::ToolCallArguments {
                        index,
                        delta: arguments.to_string(),
                    });
                }
            }
        }
    }

    Ok(events)
}

/// Events carried by one responses API stream event. Unknown event types carry nothing.
pub fn responses_event_to_stream_events(event: &Value) -> Result<Vec<StreamEvent>> {
    let index = event
        .get("output_index")
        .and_then(Value::as_u64)
        .unwrap_or_default() as usize;

    let events = match event.get("type").and_then(Value::as_str).unwrap_or_default() {
        "response.output_text.delta" => event
            .get("delta")
            .and_then(Value::as_str)
            .filter(|delta| !delta.is_empty())
            .map(|delta| vec![StreamEvent::TextDelta(delta.to_string())])
            .unwrap_or_default(),
        "response.output_item.added" => {
            let item = &event["item"];
            if item.get("type").and_then(Value::as_str) != Some("function_call") {
                return Ok(vec![]);
            }
            let mut events = Vec::new();
            if let Some(id) = item.get("call_id").and_then(Value::as_str) {
                events.push(StreamEvent::ToolCallId {
                    index,
                    id: id.to_string(),
                });
            }
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                events.push(StreamEvent::ToolCallName {
                    index,
                    name: name.to_string(),
                });
            }
            if let Some(arguments) = item.get("arguments").and_then(Value::as_str) {
                if !arguments.is_empty() {
                    events.push(StreamEvent::ToolCallArguments {
                        index,
                        delta: arguments.to_string(),
                    });
                }
            }
            events
        }
        "response.function_call_arguments.delta" => event
            .get("delta")
            .and_then(Value::as_str)
            .map(|delta| {
                vec![StreamEvent::ToolCallArguments {
                    index,
                    delta: delta.to_string(),
                }]
            })
            .unwrap_or_default(),
        "error" => {
            if let Some(err) = check_openai_context_length_error(event) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", event));
        }
        "response.failed" => {
            let error = &event["response"]["error"];
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }
        _ => vec![],
    };

    Ok(events)
}

const DONE: &str = "[DONE]";

/// Splits a server-sent event byte stream into the data payload of each event
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data of every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = Self::event_data(&raw[..end]) {
                events.push(data);
            }
        }
        events
    }

    /// Data of a trailing event that was not terminated by a blank line
    pub fn finish(self) -> Option<String> {
        Self::event_data(&self.buffer)
    }

    fn event_data(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let lines: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.strip_prefix(' ').unwrap_or(data))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Data payloads of a streamed response, ending at the `[DONE]` sentinel
pub fn sse_data(response: Response) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = response.bytes_stream();
        let mut done = false;

        while !done {
            let Some(chunk) = bytes.next().await else {
                break;
            };
            for data in decoder.push(&chunk?) {
                if data == DONE {
                    done = true;
                    break;
                }
                yield data;
            }
        }

        if !done {
            if let Some(data) = decoder.finish() {
                if data != DONE {
                    yield data;
                }
            }
        }
    }
}

/// Stream events decoded from the JSON payloads of a streamed response
pub fn sse_events<F>(response: Response, parse: F) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    F: Fn(&Value) -> Result<Vec<StreamEvent>> + Send + 'static,
{
    try_stream! {
        let data = sse_data(response);
        futures::pin_mut!(data);
        while let Some(data) = data.next().await {
            let chunk: Value = serde_json::from_str(&data?)?;
            for event in parse(&chunk)? {
                yield event;
            }
        }
    }
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
