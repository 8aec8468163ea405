pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Agent, KnowledgeBase, KnowledgeBaseSearch, KnowledgeGroup};

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Storage of the knowledge API. Every method is atomic: it either stores
/// everything it was given or nothing.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Store an agent and its links to existing sub-agents
    async fn create_agent(&self, agent: &Agent, sub_agents: &[Uuid]) -> ApiResult<()>;

    async fn create_knowledge_group(&self, group: &KnowledgeGroup) -> ApiResult<()>;

    async fn create_knowledge_bases(&self, documents: &[KnowledgeBase]) -> ApiResult<()>;

    /// The `limit` documents of a group closest to `embedding` by cosine
    /// distance, nearest first. With a threshold only documents whose
    /// similarity reaches it are considered.
    async fn search_knowledge_bases(
        &self,
        knowledge_group_id: Uuid,
        embedding: &[f32],
        limit: usize,
        threshold: Option<f64>,
    ) -> ApiResult<Vec<KnowledgeBaseSearch>>;
}
