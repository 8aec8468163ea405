use super::{
    base::Provider, configs::ProviderConfig, openai::OpenAiProvider,
    openai_responses::OpenAiResponsesProvider,
};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::OpenAiResponses(openai_config) => {
            Ok(Box::new(OpenAiResponsesProvider::new(openai_config)?))
        }
    }
}
