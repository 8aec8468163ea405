use std::sync::Arc;
use synapse::providers::base::Embedder;

use crate::repositories::KnowledgeRepository;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn KnowledgeRepository>,
    pub embedder: Arc<dyn Embedder>,
    /// Size of every stored embedding
    pub dimensions: usize,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn KnowledgeRepository>,
        embedder: Arc<dyn Embedder>,
        dimensions: usize,
    ) -> Self {
        Self {
            repository,
            embedder,
            dimensions,
        }
    }
}
