use super::message::Message;
use super::role::Role;

/// The state of one chat session: the system prompt and every message so far.
///
/// Owned by the caller and lent to the agent for the duration of a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub system: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new<S: Into<String>>(system: S) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything from the most recent user text message onwards, resetting
    /// the conversation to before the last prompt was sent.
    pub fn rewind_last_turn(&mut self) {
        let last_prompt = self.messages.iter().rposition(|message| {
            message.role == Role::User && message.tool_requests().is_empty() && !message.text().is_empty()
        });
        if let Some(index) = last_prompt {
            self.messages.truncate(index);
        }
    }
}
