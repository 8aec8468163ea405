use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{KnowledgeGroup, KnowledgeGroupCreate};
use crate::repositories::KnowledgeRepository;

pub async fn create(
    repository: &dyn KnowledgeRepository,
    input: KnowledgeGroupCreate,
) -> ApiResult<Uuid> {
    let group = KnowledgeGroup {
        id: Uuid::new_v4(),
        name: input.name,
        description: Some(input.description),
    };
    repository.create_knowledge_group(&group).await?;
    tracing::info!(knowledge_group_id = %group.id, "created knowledge group");
    Ok(group.id)
}
