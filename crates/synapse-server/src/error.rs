use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted settings key
pub fn to_env_var(field: &str) -> String {
    format!("SYNAPSE_{}", field.replace('.', "__").to_uppercase())
}

/// Errors of the knowledge API, rendered as `{"error": message}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Database(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Embedding(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
            tracing::warn!("Rejected dangling reference: {:?}", err);
            return ApiError::bad_request("Referenced entity does not exist");
        }

        // Log the full error, the response stays generic
        tracing::error!("Database error: {:?}", err);
        ApiError::Database("Database operation failed".to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);
        ApiError::Database("Failed to acquire database connection".to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("database.url"), "SYNAPSE_DATABASE__URL");
        assert_eq!(to_env_var("embedding.api_key"), "SYNAPSE_EMBEDDING__API_KEY");
        assert_eq!(to_env_var("app_name"), "SYNAPSE_APP_NAME");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("k").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Embedding("x".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
