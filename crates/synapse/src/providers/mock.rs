use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex};

use super::base::{Provider, ProviderStream};
use super::stream::StreamEvent;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A mock provider that replays pre-configured rounds of stream events
#[derive(Clone)]
pub struct MockProvider {
    rounds: Arc<Mutex<Vec<Vec<StreamEvent>>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with one event list per model call
    pub fn new(rounds: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(rounds)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The messages seen by each model call so far
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<ProviderStream> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut rounds = self.rounds.lock().unwrap();
        // An exhausted script answers with an empty response
        let events = if rounds.is_empty() {
            Vec::new()
        } else {
            rounds.remove(0)
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
