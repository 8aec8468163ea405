//! These models represent the objects passed around by the chat loop
//!
//! There are several different related formats we need to interact with:
//! - openapi operations, reflected into tools at start-up
//! - openai chat completions messages/tools, sent from the agent to the LLM
//! - openai responses input items/tools, sent from the agent to the LLM
//! - streamed deltas, sent from the LLM back to the agent
//!
//! We always immediately convert those data models into the internal structs
//! using to/from helpers, so the internal models are not an exact match to any
//! of these formats.
pub mod conversation;
pub mod message;
pub mod role;
pub mod tool;
