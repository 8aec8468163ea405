use anyhow::Result;
use futures::StreamExt;

use crate::prompt::{InputType, Prompt};
use synapse::agent::Agent;
use synapse::models::conversation::Conversation;

pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    conversation: Conversation,
}

impl<'a> Session<'a> {
    pub fn new<S: Into<String>>(agent: Agent, prompt: Box<dyn Prompt + 'a>, system_prompt: S) -> Self {
        Session {
            agent,
            prompt,
            conversation: Conversation::new(system_prompt),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process_turn(&content).await;
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }
        }

        self.prompt.close();
        Ok(())
    }

    async fn process_turn(&mut self, text: &str) {
        self.prompt.show_busy();

        let mut rewind = false;
        {
            let mut stream = self.agent.reply(&mut self.conversation, text);
            loop {
                tokio::select! {
                    event = stream.next() => {
                        match event {
                            Some(Ok(event)) => self.prompt.render(&event),
                            Some(Err(e)) => {
                                tracing::error!("turn failed: {:#}", e);
                                self.prompt.render_error(&format!("{:#}", e));
                                rewind = true;
                                break;
                            }
                            None => break,
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        self.prompt.render_info(" Interrupt: Resetting conversation to before the last sent message...");
                        rewind = true;
                        break;
                    }
                }
            }
        }

        // The unfinished exchange would confuse the model on the next turn
        if rewind {
            self.conversation.rewind_last_turn();
        }
        self.prompt.end_reply();
    }
}
