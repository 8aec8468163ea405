use anyhow::Result;
use synapse::agent::ReplyEvent;

pub mod rustyline;

pub trait Prompt {
    /// Show one event of a running turn
    fn render(&mut self, event: &ReplyEvent);
    /// Show a line that is not part of the conversation
    fn render_info(&mut self, info: &str);
    fn render_error(&mut self, error: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    /// Called when a turn is over, whether it finished or not
    fn end_reply(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("Synapse is running! Ask a question, or type \"exit\" to end the session.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

impl Input {
    pub fn message<S: Into<String>>(content: S) -> Self {
        Input {
            input_type: InputType::Message,
            content: Some(content.into()),
        }
    }

    pub fn control(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}
