use std::io::{self, Write};

use anyhow::Result;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

use super::{Input, InputType, Prompt};
use synapse::agent::ReplyEvent;
use synapse::models::message::{ToolRequest, ToolResponse};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m> \x1b[0m";
const MAX_STRING_LENGTH: usize = 40;
const MAX_RESULT_LENGTH: usize = 400;
const INDENT: &str = "    ";

pub struct RustylinePrompt {
    editor: Option<DefaultEditor>,
    spinner: Option<cliclack::ProgressBar>,
    // Length of the streamed assistant text already on screen
    printed: usize,
}

impl RustylinePrompt {
    pub fn new() -> Self {
        RustylinePrompt {
            editor: None,
            spinner: None,
            printed: 0,
        }
    }

    fn print_content(&mut self, content: &str) {
        self.hide_busy();
        match content.get(self.printed..) {
            Some(tail) => print!("{}", tail),
            None => print!("\n{}", content),
        }
        self.printed = content.len();
        io::stdout().flush().ok();
    }

    fn finish_content(&mut self) {
        if self.printed > 0 {
            print_newline();
            self.printed = 0;
        }
    }
}

/// Map a line typed by the user onto what the session should do with it
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();
    if text.is_empty() {
        return Input::control(InputType::AskAgain);
    }

    match text.to_ascii_lowercase().as_str() {
        "exit" | "quit" | "/exit" | "/quit" => Input::control(InputType::Exit),
        "/?" | "/help" => {
            println!("Commands:");
            println!("exit | quit - Exit the session");
            println!("/? | /help - Display this help message");
            println!("Ctrl+C - Interrupt the reply (resets the conversation to before the interrupted question)");
            Input::control(InputType::AskAgain)
        }
        _ => Input::message(text),
    }
}

fn print_request(request: &ToolRequest) {
    print_newline();
    match &request.tool_call {
        Ok(call) => {
            println!(
                "─── {} | {} ──────────────────────────",
                style(&call.name),
                style(&request.id).magenta().dim(),
            );
            print_params(&call.arguments, 0);
        }
        Err(e) => println!("{}", style(e).red()),
    }
}

fn print_response(response: &ToolResponse) {
    match &response.tool_result {
        Ok(body) => {
            let shown: String = body.chars().take(MAX_RESULT_LENGTH).collect();
            if shown.len() < body.len() {
                println!("{} {}", style(shown).dim(), style("...").dim());
            } else {
                println!("{}", style(shown).dim());
            }
        }
        Err(e) => println!("{}", style(e).red()),
    }
    print_newline();
}

/// Format and print parameters recursively with proper indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", indent, style(key).dim());
                        print_params(val, depth + 1);
                    }
                    Value::Array(arr) => {
                        println!("{}{}:", indent, style(key).dim());
                        for item in arr.iter() {
                            println!("{}{}- ", indent, INDENT);
                            print_params(item, depth + 2);
                        }
                    }
                    Value::String(s) if s.len() > MAX_STRING_LENGTH => {
                        println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                    }
                    Value::String(s) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                    }
                    Value::Number(n) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(n).blue());
                    }
                    Value::Bool(b) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(b).blue());
                    }
                    Value::Null => {
                        println!("{}{}: {}", indent, style(key).dim(), style("null").dim());
                    }
                }
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}.", indent, i + 1);
                print_params(item, depth + 1);
            }
        }
        Value::String(s) => println!("{}{}", indent, style(s).green()),
        other => println!("{}{}", indent, style(other).yellow()),
    }
}

fn print_newline() {
    println!();
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, event: &ReplyEvent) {
        match event {
            ReplyEvent::Content(content) => self.print_content(content),
            ReplyEvent::ToolRequest(request) => {
                self.hide_busy();
                self.finish_content();
                print_request(request);
            }
            ReplyEvent::ToolResponse(response) => {
                print_response(response);
                self.show_busy();
            }
        }
    }

    fn render_info(&mut self, info: &str) {
        self.hide_busy();
        println!("{}", style(info).dim());
    }

    fn render_error(&mut self, error: &str) {
        self.hide_busy();
        self.finish_content();
        eprintln!("{} {}", style("Error:").red().bold(), error);
    }

    fn get_input(&mut self) -> Result<Input> {
        if self.editor.is_none() {
            self.editor = Some(DefaultEditor::new()?);
        }
        let Some(editor) = self.editor.as_mut() else {
            return Ok(Input::control(InputType::Exit));
        };

        match editor.readline(PROMPT) {
            Ok(line) => {
                let input = parse_input(&line);
                if input.input_type == InputType::Message {
                    editor.add_history_entry(line.trim())?;
                }
                Ok(input)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                Ok(Input::control(InputType::Exit))
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                Ok(Input::control(InputType::Exit))
            }
        }
    }

    fn show_busy(&mut self) {
        let spin = spinner();
        spin.start("awaiting reply...");
        self.spinner = Some(spin);
    }

    fn hide_busy(&mut self) {
        if let Some(spin) = self.spinner.take() {
            spin.stop("");
        }
    }

    fn end_reply(&mut self) {
        self.hide_busy();
        self.finish_content();
        print_newline();
    }

    fn close(&self) {
        // No cleanup required
    }
}
