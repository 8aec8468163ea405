use synapse::providers::base::Embedder;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{KnowledgeBase, KnowledgeBaseCreate, KnowledgeBaseSearch};
use crate::repositories::KnowledgeRepository;

/// Embed `texts` and check every vector has the size the database stores.
///
/// Zero vectors are rejected too: their cosine distance is undefined, and
/// pgvector reports it as NaN.
async fn embed(
    embedder: &dyn Embedder,
    dimensions: usize,
    texts: &[String],
) -> ApiResult<Vec<Vec<f32>>> {
    let embeddings = embedder.embed(texts).await.map_err(|e| {
        tracing::error!("Embedding request failed: {:?}", e);
        ApiError::Embedding(e.to_string())
    })?;

    if embeddings.len() != texts.len() {
        return Err(ApiError::Embedding(format!(
            "Expected {} embeddings, got {}",
            texts.len(),
            embeddings.len()
        )));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(ApiError::Embedding(format!(
            "Expected vectors of {} dimensions, got {}",
            dimensions,
            bad.len()
        )));
    }
    if embeddings.iter().any(|e| e.iter().all(|v| *v == 0.0)) {
        return Err(ApiError::Embedding(
            "Embedding provider returned a zero vector".to_string(),
        ));
    }
    Ok(embeddings)
}

/// Embed and store documents in a group, returning their ids in input order
pub async fn create(
    repository: &dyn KnowledgeRepository,
    embedder: &dyn Embedder,
    dimensions: usize,
    knowledge_group_id: Uuid,
    documents: Vec<KnowledgeBaseCreate>,
) -> ApiResult<Vec<Uuid>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
    let embeddings = embed(embedder, dimensions, &texts).await?;

    let rows: Vec<KnowledgeBase> = documents
        .into_iter()
        .zip(embeddings)
        .map(|(document, embedding)| KnowledgeBase {
            id: Uuid::new_v4(),
            knowledge_group_id,
            name: document.name,
            content: document.content,
            embedding,
        })
        .collect();

    repository.create_knowledge_bases(&rows).await?;
    tracing::info!(%knowledge_group_id, count = rows.len(), "stored knowledge bases");
    Ok(rows.into_iter().map(|row| row.id).collect())
}

/// The `k` documents of a group closest to the query text
pub async fn search(
    repository: &dyn KnowledgeRepository,
    embedder: &dyn Embedder,
    dimensions: usize,
    knowledge_group_id: Uuid,
    query: &str,
    k: usize,
    threshold: Option<f64>,
) -> ApiResult<Vec<KnowledgeBaseSearch>> {
    let mut embeddings = embed(embedder, dimensions, &[query.to_string()]).await?;
    let embedding = embeddings
        .pop()
        .ok_or_else(|| ApiError::Embedding("No embedding returned for the query".to_string()))?;

    let hits = repository
        .search_knowledge_bases(knowledge_group_id, &embedding, k, threshold)
        .await?;
    tracing::debug!(%knowledge_group_id, k, hits = hits.len(), "searched knowledge bases");
    Ok(hits)
}
