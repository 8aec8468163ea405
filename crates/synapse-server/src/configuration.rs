use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use synapse::providers::configs::{OPENAI_DEFAULT_EMBEDDING_MODEL, OPENAI_HOST};

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_openai_host")]
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The database URL, present once settings are validated
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("database.url"),
            })
    }

    /// The embedding API key, present once settings are validated
    pub fn embedding_api_key(&self) -> Result<&str, ConfigError> {
        self.embedding
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("embedding.api_key"),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.database_url()?;
        self.embedding_api_key()?;
        Ok(())
    }

    fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("app_name", default_app_name())?
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("database.pool_size", default_pool_size() as u64)?
            .set_default("embedding.model", default_embedding_model())?
            .set_default("embedding.dimensions", default_dimensions() as u64)?
            .set_default("embedding.host", default_openai_host())?;

        // The embedding key falls back to the usual OpenAI variable
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_default("embedding.api_key", api_key)?;
        }

        let config = builder
            .add_source(
                Environment::with_prefix("SYNAPSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_app_name() -> String {
    "Synapse".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_pool_size() -> usize {
    16
}

fn default_embedding_model() -> String {
    OPENAI_DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SYNAPSE_") {
                env::remove_var(&key);
            }
        }
        env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("SYNAPSE_DATABASE__URL", "postgres://localhost/synapse");
        env::set_var("SYNAPSE_EMBEDDING__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.app_name, "Synapse");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.database.pool_size, 16);
        assert_eq!(settings.database_url().unwrap(), "postgres://localhost/synapse");
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.embedding.host, "https://api.openai.com");
        assert_eq!(settings.embedding_api_key().unwrap(), "test-key");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("SYNAPSE_APP_NAME", "Knowledge");
        env::set_var("SYNAPSE_SERVER__PORT", "8080");
        env::set_var("SYNAPSE_DATABASE__URL", "postgres://db/synapse");
        env::set_var("SYNAPSE_DATABASE__POOL_SIZE", "4");
        env::set_var("SYNAPSE_EMBEDDING__MODEL", "text-embedding-3-large");
        env::set_var("SYNAPSE_EMBEDDING__DIMENSIONS", "3072");
        env::set_var("OPENAI_API_KEY", "fallback-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.app_name, "Knowledge");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.database.pool_size, 4);
        assert_eq!(settings.embedding.model, "text-embedding-3-large");
        assert_eq!(settings.embedding.dimensions, 3072);
        assert_eq!(settings.embedding_api_key().unwrap(), "fallback-key");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_database_url() {
        clean_env();
        env::set_var("SYNAPSE_EMBEDDING__API_KEY", "test-key");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "SYNAPSE_DATABASE__URL")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_embedding_key() {
        clean_env();
        env::set_var("SYNAPSE_DATABASE__URL", "postgres://localhost/synapse");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "SYNAPSE_EMBEDDING__API_KEY")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
