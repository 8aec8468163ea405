use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use super::KnowledgeRepository;
use crate::db::vector_literal;
use crate::error::{ApiError, ApiResult};
use crate::models::{Agent, KnowledgeBase, KnowledgeBaseSearch, KnowledgeGroup};

const INSERT_AGENT: &str = "INSERT INTO agents (id, name, description, instructions, model) \
     VALUES ($1, $2, $3, $4, $5)";

const INSERT_NESTED_AGENT: &str =
    "INSERT INTO nested_agents (agent_id, sub_agent_id) VALUES ($1, $2)";

const INSERT_KNOWLEDGE_GROUP: &str =
    "INSERT INTO knowledge_groups (id, name, description) VALUES ($1, $2, $3)";

const INSERT_KNOWLEDGE_BASE: &str = "INSERT INTO knowledge_bases \
     (id, knowledge_group_id, name, content, embedding) \
     VALUES ($1, $2, $3, $4, $5::text::vector)";

const SEARCH_KNOWLEDGE_BASES: &str = "SELECT id, name, content, \
            (embedding <=> $2::text::vector)::float8 AS distance \
     FROM knowledge_bases \
     WHERE knowledge_group_id = $1 \
       AND ($3::float8 IS NULL OR (embedding <=> $2::text::vector) <= 1 - $3::float8) \
     ORDER BY embedding <=> $2::text::vector \
     LIMIT $4";

/// PostgreSQL with the pgvector extension
#[derive(Clone)]
pub struct PostgresRepository {
    pool: Pool,
}

impl PostgresRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeRepository for PostgresRepository {
    async fn create_agent(&self, agent: &Agent, sub_agents: &[Uuid]) -> ApiResult<()> {
        let model = serde_json::to_value(&agent.model)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.execute(
            INSERT_AGENT,
            &[
                &agent.id,
                &agent.name,
                &agent.description,
                &agent.instructions,
                &model,
            ],
        )
        .await?;

        if !sub_agents.is_empty() {
            let statement = tx.prepare(INSERT_NESTED_AGENT).await?;
            for sub_agent_id in sub_agents {
                tx.execute(&statement, &[&agent.id, sub_agent_id]).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_knowledge_group(&self, group: &KnowledgeGroup) -> ApiResult<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.execute(
            INSERT_KNOWLEDGE_GROUP,
            &[&group.id, &group.name, &group.description],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_knowledge_bases(&self, documents: &[KnowledgeBase]) -> ApiResult<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let statement = tx.prepare(INSERT_KNOWLEDGE_BASE).await?;
        for document in documents {
            tx.execute(
                &statement,
                &[
                    &document.id,
                    &document.knowledge_group_id,
                    &document.name,
                    &document.content,
                    &vector_literal(&document.embedding),
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_knowledge_bases(
        &self,
        knowledge_group_id: Uuid,
        embedding: &[f32],
        limit: usize,
        threshold: Option<f64>,
    ) -> ApiResult<Vec<KnowledgeBaseSearch>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                SEARCH_KNOWLEDGE_BASES,
                &[
                    &knowledge_group_id,
                    &vector_literal(embedding),
                    &threshold,
                    &(limit as i64),
                ],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                KnowledgeBaseSearch::new(
                    row.get("id"),
                    row.get("name"),
                    row.get("content"),
                    row.get("distance"),
                )
            })
            .collect())
    }
}
