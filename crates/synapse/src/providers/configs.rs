pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1";
pub const OPENAI_DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Sampling is deterministic unless configured otherwise
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Unified enum to wrap the supported model APIs
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// The legacy chat completions API
    OpenAi(OpenAiProviderConfig),
    /// The responses API
    OpenAiResponses(OpenAiProviderConfig),
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: OPENAI_DEFAULT_MODEL.to_string(),
            embedding_model: OPENAI_DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model<S: Into<String>>(mut self, model: S) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}/v1/{}", self.host.trim_end_matches('/'), endpoint)
    }
}
