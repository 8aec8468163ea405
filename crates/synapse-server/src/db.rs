use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

const SCHEMA: &str = include_str!("../schema.sql");

/// Create a connection pool for a `postgres://` URL
pub fn create_pool(url: &str, max_size: usize) -> ApiResult<Pool> {
    let mut cfg = Config::new();
    cfg.url = Some(url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_size));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| ApiError::Database(format!("Failed to create pool: {}", e)))
}

/// The schema statements with the embedding column sized to `dimensions`
pub fn schema_sql(dimensions: usize) -> String {
    SCHEMA.replace("{dimensions}", &dimensions.to_string())
}

/// Create the extension, tables and indexes that do not exist yet
pub async fn apply_schema(pool: &Pool, dimensions: usize) -> ApiResult<()> {
    let client = pool.get().await?;
    client.batch_execute(&schema_sql(dimensions)).await?;
    tracing::info!(dimensions, "database schema is up to date");
    Ok(())
}

/// Text form of a pgvector value, bound as `$n::text::vector`
pub fn vector_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}
