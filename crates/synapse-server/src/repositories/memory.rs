use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::KnowledgeRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{Agent, KnowledgeBase, KnowledgeBaseSearch, KnowledgeGroup};

#[derive(Default)]
struct Store {
    agents: HashMap<Uuid, Agent>,
    nested_agents: HashSet<(Uuid, Uuid)>,
    knowledge_groups: HashMap<Uuid, KnowledgeGroup>,
    knowledge_bases: Vec<KnowledgeBase>,
}

/// Keeps everything in process memory, with the same reference checks the
/// database enforces through foreign keys
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> ApiResult<std::sync::MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| ApiError::Database("Store lock poisoned".to_string()))
    }

    pub fn agent(&self, id: Uuid) -> Option<Agent> {
        self.store().ok()?.agents.get(&id).cloned()
    }

    pub fn sub_agents(&self, id: Uuid) -> Vec<Uuid> {
        self.store()
            .map(|store| {
                store
                    .nested_agents
                    .iter()
                    .filter(|(agent_id, _)| *agent_id == id)
                    .map(|(_, sub_agent_id)| *sub_agent_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn knowledge_base_count(&self) -> usize {
        self.store()
            .map(|store| store.knowledge_bases.len())
            .unwrap_or_default()
    }
}

fn dangling_reference() -> ApiError {
    ApiError::bad_request("Referenced entity does not exist")
}

/// One minus the cosine similarity. Zero vectors never reach a repository, the
/// knowledge base service rejects them; here they count as unrelated.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl KnowledgeRepository for MemoryRepository {
    async fn create_agent(&self, agent: &Agent, sub_agents: &[Uuid]) -> ApiResult<()> {
        let mut store = self.store()?;
        if sub_agents
            .iter()
            .any(|id| *id != agent.id && !store.agents.contains_key(id))
        {
            return Err(dangling_reference());
        }
        store.agents.insert(agent.id, agent.clone());
        for sub_agent_id in sub_agents {
            store.nested_agents.insert((agent.id, *sub_agent_id));
        }
        Ok(())
    }

    async fn create_knowledge_group(&self, group: &KnowledgeGroup) -> ApiResult<()> {
        self.store()?
            .knowledge_groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn create_knowledge_bases(&self, documents: &[KnowledgeBase]) -> ApiResult<()> {
        let mut store = self.store()?;
        if documents
            .iter()
            .any(|document| !store.knowledge_groups.contains_key(&document.knowledge_group_id))
        {
            return Err(dangling_reference());
        }
        store.knowledge_bases.extend(documents.iter().cloned());
        Ok(())
    }

    async fn search_knowledge_bases(
        &self,
        knowledge_group_id: Uuid,
        embedding: &[f32],
        limit: usize,
        threshold: Option<f64>,
    ) -> ApiResult<Vec<KnowledgeBaseSearch>> {
        let store = self.store()?;
        let mut hits: Vec<KnowledgeBaseSearch> = store
            .knowledge_bases
            .iter()
            .filter(|document| document.knowledge_group_id == knowledge_group_id)
            .map(|document| {
                KnowledgeBaseSearch::new(
                    document.id,
                    document.name.clone(),
                    document.content.clone(),
                    cosine_distance(&document.embedding, embedding),
                )
            })
            .filter(|hit| threshold.map_or(true, |t| hit.distance <= 1.0 - t))
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }
}
