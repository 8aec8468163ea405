use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use synapse::agent::Agent;
use synapse::dispatch::HttpDispatcher;
use synapse::openapi::OpenApiDocument;
use synapse::providers::configs::{OpenAiProviderConfig, ProviderConfig, OPENAI_HOST};
use synapse::providers::factory;

mod prompt;
mod session;

use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OpenAPI document describing the API the assistant may call
    #[arg(long, default_value = "openapi.yaml")]
    openapi: PathBuf,

    /// File holding the system prompt
    #[arg(long, default_value = "system_prompt.md")]
    system_prompt: PathBuf,

    /// Which model API to talk to
    #[arg(long, value_enum, default_value = "responses")]
    api: ApiVariant,

    /// Model to use
    #[arg(short, long, default_value = synapse::providers::configs::OPENAI_DEFAULT_MODEL)]
    model: String,

    /// OpenAI API Key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Bearer token sent to the API described by the OpenAPI document
    #[arg(long, env = "API_ACCESS_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Model API host
    #[arg(long, default_value = OPENAI_HOST)]
    host: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum ApiVariant {
    Responses,
    ChatCompletions,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    let api_key = cli
        .api_key
        .clone()
        .context("API key must be provided via --api-key or OPENAI_API_KEY environment variable")?;

    let config = OpenAiProviderConfig::new(api_key)
        .with_host(cli.host.clone())
        .with_model(cli.model.clone());

    Ok(match cli.api {
        ApiVariant::Responses => ProviderConfig::OpenAiResponses(config),
        ApiVariant::ChatCompletions => ProviderConfig::OpenAi(config),
    })
}

fn build_agent(cli: &Cli) -> Result<Agent> {
    let document = OpenApiDocument::from_path(&cli.openapi)
        .with_context(|| format!("Failed to load {}", cli.openapi.display()))?;

    let mut dispatcher = HttpDispatcher::new(Arc::new(document))?;
    match &cli.bearer_token {
        Some(token) => dispatcher = dispatcher.with_bearer_token(token),
        None => tracing::warn!("No API_ACCESS_TOKEN set, calling the API without authorization"),
    }

    let provider = factory::get_provider(provider_config(cli)?)?;
    Agent::new(provider, dispatcher)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let system_prompt = std::fs::read_to_string(&cli.system_prompt)
        .with_context(|| format!("Failed to read {}", cli.system_prompt.display()))?;
    let agent = build_agent(&cli)?;
    tracing::info!(tools = agent.tools().len(), "tools loaded");

    let mut session = Session::new(agent, Box::new(RustylinePrompt::new()), system_prompt);
    session.start().await
}
