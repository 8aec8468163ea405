use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Agent, AgentCreate};
use crate::repositories::KnowledgeRepository;

/// Store a new agent, linking it to the listed sub-agents
pub async fn create(repository: &dyn KnowledgeRepository, input: AgentCreate) -> ApiResult<Uuid> {
    let agent = Agent {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        instructions: input.instructions,
        model: input.model,
    };

    // A repeated sub-agent would collide on the link's primary key
    let mut sub_agents: Vec<Uuid> = Vec::new();
    for id in input.sub_agents.unwrap_or_default() {
        if !sub_agents.contains(&id) {
            sub_agents.push(id);
        }
    }

    repository.create_agent(&agent, &sub_agents).await?;
    tracing::info!(agent_id = %agent.id, sub_agents = sub_agents.len(), "created agent");
    Ok(agent.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::LlmConfig;
    use crate::repositories::MemoryRepository;

    fn input(name: &str, sub_agents: Option<Vec<Uuid>>) -> AgentCreate {
        AgentCreate {
            name: name.to_string(),
            description: format!("{} agent", name),
            instructions: "Answer briefly".to_string(),
            model: LlmConfig {
                name: "gpt-4.1-mini".to_string(),
                settings: None,
            },
            sub_agents,
        }
    }

    #[tokio::test]
    async fn test_create_links_sub_agents_once() -> ApiResult<()> {
        let repo = MemoryRepository::new();
        let helper = create(&repo, input("helper", None)).await?;
        let lead = create(&repo, input("lead", Some(vec![helper, helper]))).await?;

        assert_ne!(helper, lead);
        assert_eq!(repo.sub_agents(lead), vec![helper]);
        assert_eq!(repo.agent(lead).map(|a| a.name), Some("lead".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_sub_agent() {
        let repo = MemoryRepository::new();
        let err = create(&repo, input("lead", Some(vec![Uuid::new_v4()])))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
