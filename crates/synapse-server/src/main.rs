use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use synapse::providers::configs::OpenAiProviderConfig;
use synapse::providers::openai::OpenAiProvider;
use synapse_server::configuration::Settings;
use synapse_server::repositories::PostgresRepository;
use synapse_server::state::AppState;
use synapse_server::{app, db};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    // Load configuration
    let settings = Settings::new()?;

    let pool = db::create_pool(settings.database_url()?, settings.database.pool_size)?;
    db::apply_schema(&pool, settings.embedding.dimensions)
        .await
        .context("Failed to apply the database schema")?;

    let embedder = OpenAiProvider::new(
        OpenAiProviderConfig::new(settings.embedding_api_key()?)
            .with_host(settings.embedding.host.clone())
            .with_embedding_model(settings.embedding.model.clone()),
    )?;

    let state = AppState::new(
        Arc::new(PostgresRepository::new(pool)),
        Arc::new(embedder),
        settings.embedding.dimensions,
    );

    let addr = settings.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("{} listening on {}", settings.app_name, listener.local_addr()?);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
